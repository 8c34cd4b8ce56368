//! inline html for the operator pages
//!
//! the dashboard is a static shell; its script polls GET /get_data.

const STYLE: &str = r#"
    body { font-family: system-ui; padding: 2rem; background: #1a1a2e; color: #eee; }
    .card { background: #16213e; padding: 1.5rem; border-radius: 8px; max-width: 32rem; }
    table { width: 100%; border-collapse: collapse; }
    td { padding: 0.4rem 0; border-bottom: 1px solid #233; }
    td.value { text-align: right; font-variant-numeric: tabular-nums; }
    .error { color: #ff6b6b; }
    a { color: #8ab4f8; }
    input { display: block; margin: 0.5rem 0 1rem; padding: 0.4rem; width: 100%; }
"#;

/// login form, optionally with an error line
pub fn login(error: Option<&str>) -> String {
    let error_html = error
        .map(|e| format!(r#"<p class="error">{}</p>"#, html_escape(e)))
        .unwrap_or_default();

    format!(
        r#"<!doctype html>
<html>
<head><title>soil hub - login</title><style>{STYLE}</style></head>
<body>
  <div class="card">
    <h1>soil hub</h1>
    {error_html}
    <form method="post" action="/login">
      <label>username <input name="username" autocomplete="username"></label>
      <label>password
        <input name="password" type="password" autocomplete="current-password">
      </label>
      <button type="submit">sign in</button>
    </form>
  </div>
</body>
</html>"#
    )
}

/// dashboard shell
pub fn dashboard() -> String {
    format!(
        r#"<!doctype html>
<html>
<head><title>soil hub</title><style>{STYLE}</style></head>
<body>
  <div class="card">
    <h1>soil health</h1>
    <table>
      <tr><td>temperature (°C)</td><td class="value" id="temperature">-</td></tr>
      <tr><td>soil moisture (%)</td><td class="value" id="soil_moisture">-</td></tr>
      <tr><td>pH</td><td class="value" id="ph">-</td></tr>
      <tr><td>nitrogen (mg/kg)</td><td class="value" id="nitrogen">-</td></tr>
      <tr><td>phosphorus (mg/kg)</td><td class="value" id="phosphorus">-</td></tr>
      <tr><td>potassium (mg/kg)</td><td class="value" id="potassium">-</td></tr>
      <tr><td>last update</td><td class="value" id="datetime">-</td></tr>
    </table>
    <p><a href="/logout">log out</a></p>
  </div>
  <script>
    const FIELDS = [
      "temperature", "soil_moisture", "ph", "nitrogen", "phosphorus", "potassium", "datetime",
    ];
    async function refresh() {{
      const res = await fetch("/get_data", {{ redirect: "manual" }});
      if (res.type === "opaqueredirect") {{ window.location = "/login"; return; }}
      if (!res.ok) return;
      const data = await res.json();
      for (const f of FIELDS) {{
        document.getElementById(f).textContent = data[f] === null ? "-" : data[f];
      }}
    }}
    refresh();
    setInterval(refresh, 5000);
  </script>
</body>
</html>"#
    )
}

/// escape html special characters to prevent xss
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
