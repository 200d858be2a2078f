//! JSON payloads understood by the Visdom server.
//!
//! Non-finite numbers serialize as `null`, which the plotting frontend
//! treats as a gap rather than a point.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::WindowHandle;

/// Axis scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    #[default]
    Linear,
    Log,
}

/// Body of a `POST /events` request: creates or replaces a window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowEvent {
    pub data: Vec<Panel>,
    /// Existing window to overwrite; `None` lets the server pick an id.
    pub win: Option<WindowHandle>,
    /// Environment the window lives in.
    pub eid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<Layout>,
    pub opts: Map<String, Value>,
}

impl WindowEvent {
    pub fn new(eid: impl Into<String>, data: Vec<Panel>) -> Self {
        Self {
            data,
            win: None,
            eid: eid.into(),
            layout: None,
            opts: Map::new(),
        }
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn with_opt(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.opts.insert(key.to_string(), value.into());
        self
    }

    /// Title carried in the options, if any.
    pub fn title(&self) -> Option<&str> {
        self.opts.get("title").and_then(Value::as_str)
    }

    /// Traces of a plot window, skipping content panels.
    pub fn traces(&self) -> impl Iterator<Item = &TraceData> {
        self.data.iter().filter_map(|panel| match panel {
            Panel::Trace(trace) => Some(trace),
            Panel::Content { .. } => None,
        })
    }
}

/// One element of a window's `data` array.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Panel {
    Trace(TraceData),
    Content {
        content: Content,
        #[serde(rename = "type")]
        kind: &'static str,
    },
}

impl Panel {
    pub fn text(text: impl Into<String>) -> Self {
        Panel::Content {
            content: Content::Text(text.into()),
            kind: "text",
        }
    }

    pub fn image(src: impl Into<String>, caption: impl Into<String>) -> Self {
        Panel::Content {
            content: Content::Image {
                src: src.into(),
                caption: caption.into(),
            },
            kind: "image",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Image { src: String, caption: String },
}

/// A plotly trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceData {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z: Option<Vec<f64>>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<Marker>,
}

impl TraceData {
    pub fn line(name: impl Into<String>, x: Vec<f64>, y: Vec<f64>) -> Self {
        Self {
            x,
            y,
            z: None,
            name: name.into(),
            kind: "scatter",
            mode: "lines",
            marker: None,
        }
    }

    pub fn markers(name: impl Into<String>, columns: Vec<Vec<f64>>, size: f32) -> Self {
        let mut columns = columns.into_iter();
        let x = columns.next().unwrap_or_default();
        let y = columns.next().unwrap_or_default();
        let z = columns.next();
        Self {
            kind: if z.is_some() { "scatter3d" } else { "scatter" },
            x,
            y,
            z,
            name: name.into(),
            mode: "markers",
            marker: Some(Marker { size }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Marker {
    pub size: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub title: String,
    pub showlegend: bool,
    pub xaxis: Axis,
    pub yaxis: Axis,
    /// Axes of 3-D traces; plotly ignores `xaxis`/`yaxis` for those.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene: Option<Scene>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scene {
    pub xaxis: Axis,
    pub yaxis: Axis,
    pub zaxis: Axis,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Axis {
    pub title: String,
    #[serde(rename = "type")]
    pub scale: Scale,
}

impl Axis {
    pub fn new(title: impl Into<String>, scale: Scale) -> Self {
        Self {
            title: title.into(),
            scale,
        }
    }
}

/// Body of a `POST /update` request: appends points to one named trace.
///
/// The server reads `data` as a list of traces and requires exactly one
/// when `name` is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceAppend {
    pub win: WindowHandle,
    pub eid: String,
    pub name: String,
    pub append: bool,
    pub data: Vec<TraceData>,
}

impl TraceAppend {
    pub fn new(
        eid: impl Into<String>,
        win: WindowHandle,
        name: impl Into<String>,
        x: Vec<f64>,
        y: Vec<f64>,
    ) -> Self {
        let name = name.into();
        Self {
            win,
            eid: eid.into(),
            data: vec![TraceData::line(name.clone(), x, y)],
            name,
            append: true,
        }
    }

    /// X values of the appended points.
    pub fn x(&self) -> &[f64] {
        self.data.first().map_or(&[][..], |trace| trace.x.as_slice())
    }

    /// Y values of the appended points.
    pub fn y(&self) -> &[f64] {
        self.data.first().map_or(&[][..], |trace| trace.y.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nan_serializes_as_null() {
        let event = WindowEvent::new(
            "main",
            vec![Panel::Trace(TraceData::line("Train", vec![1.0], vec![f64::NAN]))],
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["data"][0]["y"], json!([null]));
        assert_eq!(value["data"][0]["type"], json!("scatter"));
        assert_eq!(value["win"], Value::Null);
        assert!(value.get("layout").is_none());
    }

    #[test]
    fn test_content_panels() {
        let text = serde_json::to_value(Panel::text("hello")).unwrap();
        assert_eq!(text, json!({"content": "hello", "type": "text"}));

        let image = serde_json::to_value(Panel::image("data:image/png;base64,AA", "cap")).unwrap();
        assert_eq!(
            image,
            json!({"content": {"src": "data:image/png;base64,AA", "caption": "cap"}, "type": "image"})
        );
    }

    #[test]
    fn test_scale_and_append_payload() {
        let axis = serde_json::to_value(Axis::new("Epochs", Scale::Log)).unwrap();
        assert_eq!(axis, json!({"title": "Epochs", "type": "log"}));

        let update =
            TraceAppend::new("main", WindowHandle::new("w1"), "Train", vec![5.0], vec![-1.0]);
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value["win"], json!("w1"));
        assert_eq!(value["append"], json!(true));
        assert_eq!(value["name"], json!("Train"));
        assert_eq!(
            value["data"],
            json!([{"x": [5.0], "y": [-1.0], "name": "Train", "type": "scatter", "mode": "lines"}])
        );
        assert_eq!(update.x(), &[5.0]);
        assert_eq!(update.y(), &[-1.0]);
    }

    #[test]
    fn test_scene_only_for_3d_layouts() {
        let flat = Layout {
            title: "t".into(),
            showlegend: false,
            xaxis: Axis::new("a", Scale::Linear),
            yaxis: Axis::new("b", Scale::Linear),
            scene: None,
        };
        assert!(serde_json::to_value(&flat).unwrap().get("scene").is_none());

        let solid = Layout {
            scene: Some(Scene {
                xaxis: Axis::new("a", Scale::Linear),
                yaxis: Axis::new("b", Scale::Linear),
                zaxis: Axis::new("c", Scale::Linear),
            }),
            ..flat
        };
        let value = serde_json::to_value(&solid).unwrap();
        assert_eq!(value["scene"]["zaxis"]["title"], json!("c"));
    }

    #[test]
    fn test_markers_pick_3d_type() {
        let trace = TraceData::markers("1", vec![vec![0.0], vec![1.0], vec![2.0]], 5.0);
        assert_eq!(trace.kind, "scatter3d");
        assert_eq!(trace.z, Some(vec![2.0]));

        let flat = TraceData::markers("1", vec![vec![0.0], vec![1.0]], 5.0);
        assert_eq!(flat.kind, "scatter");
        assert!(flat.z.is_none());
    }
}
