use crate::payload::Payload;
use kuchiki::traits::*;
use thiserror::Error;

pub const DEFAULT_WIDGET_BASE_URL: &str = "https://widget.intercom.io";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("payload serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("html manipulation failed: {0}")]
    Html(String),
}

/// Settings script plus the widget bootstrap loader.
pub fn render(
    payload: &Payload,
    app_id: &str,
    version_tag: &str,
    widget_base_url: &str,
) -> Result<String, RenderError> {
    // No raw `<` may reach the script body: `</script>` and `<!--` both
    // change how the HTML parser reads it.
    let settings_json = serde_json::to_string(payload)?.replace('<', "\\u003c");
    let widget_src = js_single_quoted(&format!(
        "{}/widget/{}",
        widget_base_url.trim_end_matches('/'),
        app_id
    ));

    let mut out = String::from("<script id=\"IntercomSettingsScriptTag\">");
    out.push_str(&format!("// intercom-install | v{version_tag}\n"));
    out.push_str(&format!("window.intercomSettings = {settings_json};\n"));
    out.push_str("</script>\n");
    out.push_str(
        "<script>(function(){var w=window;var ic=w.Intercom;if(typeof ic===\"function\"){ic('reattach_activator');ic('update',intercomSettings);}else{var d=document;var i=function(){i.c(arguments)};i.q=[];i.c=function(args){i.q.push(args)};w.Intercom=i;function l(){var s=d.createElement('script');s.type='text/javascript';s.async=true;s.src='",
    );
    out.push_str(&widget_src);
    out.push_str(
        "';var x=d.getElementsByTagName('script')[0];x.parentNode.insertBefore(s,x);}if(w.attachEvent){w.attachEvent('onload',l);}else{w.addEventListener('load',l,false);}}})()</script>\n",
    );
    Ok(out)
}

fn js_single_quoted(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Append `fragment` as the last children of the document body.
pub fn inject_install_code(html: &str, fragment: &str) -> Result<String, RenderError> {
    let document = kuchiki::parse_html().one(html);
    let body = document
        .select_first("body")
        .map_err(|_| RenderError::Html("document has no body".to_string()))?;

    let wrapper_html = format!("<div id=\"__intercom_install_wrapper\">{fragment}</div>");
    let fragment_doc = kuchiki::parse_html().one(wrapper_html);
    let wrapper = fragment_doc
        .select_first("#__intercom_install_wrapper")
        .map_err(|_| RenderError::Html("select wrapper failed".to_string()))?;
    let children: Vec<_> = wrapper.as_node().children().collect();
    for child in children {
        body.as_node().append(child);
    }
    Ok(document.to_string())
}
