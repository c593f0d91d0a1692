use axum::response::Html;

use crate::models::{Coordinate, Route};

pub trait Page {
    fn title(&self) -> String;
    fn body(&self) -> String;

    /// Extra markup for `<head>`
    fn head(&self) -> String {
        String::new()
    }
}

pub fn render(page: &impl Page) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
{head}</head>
<body>
<nav><a href="/">Home</a> | <a href="/routes">Routes</a> | <a href="/logout">Log out</a></nav>
{body}
</body>
</html>
"#,
        title = escape(&page.title()),
        head = page.head(),
        body = page.body(),
    ))
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub struct IndexPage {
    pub email: Option<String>,
}

impl Page for IndexPage {
    fn title(&self) -> String {
        "Route Book".to_string()
    }

    fn body(&self) -> String {
        match &self.email {
            Some(email) => format!(
                "<h1>Route Book</h1>\n<p>Signed in as {}. <a href=\"/routes\">Your routes</a></p>",
                escape(email)
            ),
            None => "<h1>Route Book</h1>\n<p><a href=\"/login\">Sign in with Google</a></p>".to_string(),
        }
    }
}

pub struct RoutesPage {
    pub routes: Vec<Route>,
    pub message: Option<String>,
}

impl Page for RoutesPage {
    fn title(&self) -> String {
        "Your routes".to_string()
    }

    fn body(&self) -> String {
        let mut body = String::from("<h1>Your routes</h1>\n");

        if let Some(message) = &self.message {
            body.push_str(&format!("<p class=\"message\">{}</p>\n", escape(message)));
        }

        body.push_str(
            r#"<form action="/upload" method="post" enctype="multipart/form-data">
<input type="file" name="file" required>
<button type="submit">Upload</button>
</form>
"#,
        );

        if self.routes.is_empty() {
            body.push_str("<p>No routes yet.</p>\n");
            return body;
        }

        body.push_str("<table>\n<tr><th>Name</th><th>Created</th><th></th></tr>\n");
        for route in &self.routes {
            body.push_str(&format!(
                "<tr><td>{name}</td><td>{created}</td><td>\
                 <a href=\"/routes/{id}/polyline\">Waypoints</a> \
                 <a href=\"/routes/{id}/directions\">Directions</a> \
                 <form action=\"/routes/{id}/delete\" method=\"post\" style=\"display:inline\">\
                 <button type=\"submit\">Delete</button></form></td></tr>\n",
                id = route.id,
                name = escape(&route.name),
                created = escape(&route.created_at),
            ));
        }
        body.push_str("</table>\n");
        body
    }
}

pub struct MapPage {
    pub title: String,
    pub waypoints: Vec<Coordinate>,
    pub summary: Option<String>,
}

impl Page for MapPage {
    fn title(&self) -> String {
        self.title.clone()
    }

    fn head(&self) -> String {
        concat!(
            "<link rel=\"stylesheet\" href=\"https://unpkg.com/leaflet@1.9.4/dist/leaflet.css\">\n",
            "<script src=\"https://unpkg.com/leaflet@1.9.4/dist/leaflet.js\"></script>\n",
            "<style>#map { height: 80vh; }</style>\n",
        )
        .to_string()
    }

    fn body(&self) -> String {
        // Only numbers are embedded, so the JSON cannot close the script tag
        let points: Vec<[f64; 2]> = self.waypoints.iter().map(|c| [c.lat, c.lng]).collect();
        let points_json = serde_json::to_string(&points).unwrap_or_else(|_| "[]".to_string());

        let summary = self
            .summary
            .as_deref()
            .map(|s| format!("<p>{}</p>\n", escape(s)))
            .unwrap_or_default();

        format!(
            r#"<h1>{title}</h1>
{summary}<div id="map"></div>
<script>
const points = {points_json};
const map = L.map('map');
L.tileLayer('https://{{s}}.tile.openstreetmap.org/{{z}}/{{x}}/{{y}}.png', {{
  attribution: '&copy; OpenStreetMap contributors'
}}).addTo(map);
if (points.length > 0) {{
  const line = L.polyline(points).addTo(map);
  map.fitBounds(line.getBounds().pad(0.1));
}} else {{
  map.setView([0, 0], 2);
}}
</script>"#,
            title = escape(&self.title),
        )
    }
}

/// A short status page for conditions that have no map to show
pub struct MessagePage {
    pub title: String,
    pub message: String,
}

impl Page for MessagePage {
    fn title(&self) -> String {
        self.title.clone()
    }

    fn body(&self) -> String {
        format!(
            "<h1>{}</h1>\n<p>{}</p>\n<p><a href=\"/routes\">Back to routes</a></p>",
            escape(&self.title),
            escape(&self.message)
        )
    }
}
