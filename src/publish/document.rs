//! Static document assembly.

/// Wrap markup and stylesheet text in a standalone HTML5 document.
///
/// Both fragments are substituted literally: no escaping, no sanitising.
/// Callers pass complete fragments (or empty strings).
pub fn build(html: &str, css: &str) -> String {
    format!(
        "<!doctype html>
<html lang=\"en\">
  <head>
    <meta charset=\"utf-8\" />
    <meta name=\"viewport\" content=\"width=device-width,initial-scale=1\" />
    <style>{css}</style>
  </head>
  <body>{html}</body>
</html>"
    )
}
