//! Declarative chart descriptions.
//!
//! Entities produce a [`ChartSpec`]: a row set plus one or more mark layers
//! binding row fields to encoding channels. Turning that into pixels is the
//! job of a [`ChartRenderer`]; the bundled [`JsonFileRenderer`] writes a
//! Vega-Lite document that any Vega viewer can display.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_WIDTH: u32 = 600;
pub const DEFAULT_HEIGHT: u32 = 400;
const VEGA_LITE_SCHEMA: &str = "https://vega.github.io/schema/vega-lite/v5.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkKind {
    Bar,
    Boxplot,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Quantitative,
    Nominal,
}

/// One encoding channel binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Row field; `None` for the `count()` aggregate.
    pub field: Option<String>,
    pub field_type: FieldType,
    pub title: Option<String>,
    /// Maximum bin count when the field is binned.
    pub max_bins: Option<usize>,
    pub count: bool,
    pub domain: Option<[f64; 2]>,
    /// Keep row order instead of sorting the axis.
    pub unsorted: bool,
    pub unstacked: bool,
    pub hide_legend: bool,
    pub format: Option<String>,
}

impl Field {
    fn new(field: Option<&str>, field_type: FieldType) -> Self {
        Self {
            field: field.map(String::from),
            field_type,
            title: None,
            max_bins: None,
            count: false,
            domain: None,
            unsorted: false,
            unstacked: false,
            hide_legend: false,
            format: None,
        }
    }

    pub fn quantitative(field: &str) -> Self {
        Self::new(Some(field), FieldType::Quantitative)
    }

    pub fn nominal(field: &str) -> Self {
        Self::new(Some(field), FieldType::Nominal)
    }

    /// The number of rows falling into each bin or category.
    pub fn count() -> Self {
        Self {
            count: true,
            ..Self::new(None, FieldType::Quantitative)
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn binned(mut self, max_bins: usize) -> Self {
        self.max_bins = Some(max_bins);
        self
    }

    pub fn domain(mut self, low: f64, high: f64) -> Self {
        self.domain = Some([low, high]);
        self
    }

    pub fn unsorted(mut self) -> Self {
        self.unsorted = true;
        self
    }

    pub fn unstacked(mut self) -> Self {
        self.unstacked = true;
        self
    }

    pub fn without_legend(mut self) -> Self {
        self.hide_legend = true;
        self
    }

    pub fn format(mut self, format: &str) -> Self {
        self.format = Some(format.to_string());
        self
    }

    fn to_vega_lite(&self) -> Value {
        let mut out = Map::new();
        if let Some(field) = &self.field {
            out.insert("field".into(), json!(field));
        }
        if self.count {
            out.insert("aggregate".into(), json!("count"));
        }
        out.insert("type".into(), json!(self.field_type));
        if let Some(title) = &self.title {
            out.insert("title".into(), json!(title));
        }
        if let Some(max_bins) = self.max_bins {
            let mut bin = json!({ "maxbins": max_bins });
            // Bin boundaries follow the scale domain, not the data extent.
            if let Some(domain) = self.domain {
                bin["extent"] = json!(domain);
            }
            out.insert("bin".into(), bin);
        }
        if let Some(domain) = self.domain {
            out.insert("scale".into(), json!({ "domain": domain }));
        }
        if self.unsorted {
            out.insert("sort".into(), Value::Null);
        }
        if self.unstacked {
            out.insert("stack".into(), Value::Null);
        }
        if self.hide_legend {
            out.insert("legend".into(), Value::Null);
        }
        if let Some(format) = &self.format {
            out.insert("format".into(), json!(format));
        }
        Value::Object(out)
    }
}

/// Mark type plus its static styling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    pub kind: MarkKind,
    pub opacity: Option<f64>,
    pub bin_spacing: Option<u32>,
    pub dx: Option<i32>,
    pub font_size: Option<u32>,
    pub font_weight: Option<String>,
    pub color: Option<String>,
}

impl Mark {
    pub fn new(kind: MarkKind) -> Self {
        Self {
            kind,
            opacity: None,
            bin_spacing: None,
            dx: None,
            font_size: None,
            font_weight: None,
            color: None,
        }
    }

    fn to_vega_lite(&self) -> Value {
        let mut out = Map::new();
        out.insert("type".into(), json!(self.kind));
        if let Some(opacity) = self.opacity {
            out.insert("opacity".into(), json!(opacity));
        }
        if let Some(spacing) = self.bin_spacing {
            out.insert("binSpacing".into(), json!(spacing));
        }
        if let Some(dx) = self.dx {
            out.insert("dx".into(), json!(dx));
        }
        if let Some(size) = self.font_size {
            out.insert("fontSize".into(), json!(size));
        }
        if let Some(weight) = &self.font_weight {
            out.insert("fontWeight".into(), json!(weight));
        }
        if let Some(color) = &self.color {
            out.insert("color".into(), json!(color));
        }
        Value::Object(out)
    }
}

/// A mark with its channel bindings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub mark: Mark,
    pub x: Option<Field>,
    pub y: Option<Field>,
    pub color: Option<Field>,
    pub text: Option<Field>,
    pub tooltip: Vec<String>,
}

impl Layer {
    pub fn new(kind: MarkKind) -> Self {
        Self {
            mark: Mark::new(kind),
            x: None,
            y: None,
            color: None,
            text: None,
            tooltip: Vec::new(),
        }
    }

    pub fn x(mut self, field: Field) -> Self {
        self.x = Some(field);
        self
    }

    pub fn y(mut self, field: Field) -> Self {
        self.y = Some(field);
        self
    }

    pub fn color(mut self, field: Field) -> Self {
        self.color = Some(field);
        self
    }

    pub fn text(mut self, field: Field) -> Self {
        self.text = Some(field);
        self
    }

    pub fn tooltip(mut self, fields: &[&str]) -> Self {
        self.tooltip = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn opacity(mut self, opacity: f64) -> Self {
        self.mark.opacity = Some(opacity);
        self
    }

    pub fn bin_spacing(mut self, spacing: u32) -> Self {
        self.mark.bin_spacing = Some(spacing);
        self
    }

    /// Bold black annotation text offset `dx` pixels from its anchor.
    pub fn annotation_style(mut self, dx: i32, font_size: u32) -> Self {
        self.mark.dx = Some(dx);
        self.mark.font_size = Some(font_size);
        self.mark.font_weight = Some("bold".to_string());
        self.mark.color = Some("black".to_string());
        self
    }

    fn to_vega_lite(&self) -> Value {
        let mut encoding = Map::new();
        let channels = [
            ("x", &self.x),
            ("y", &self.y),
            ("color", &self.color),
            ("text", &self.text),
        ];
        for (name, field) in channels {
            if let Some(field) = field {
                encoding.insert(name.into(), field.to_vega_lite());
            }
        }
        if !self.tooltip.is_empty() {
            let tooltip: Vec<Value> = self.tooltip.iter().map(|f| json!({ "field": f })).collect();
            encoding.insert("tooltip".into(), Value::Array(tooltip));
        }

        json!({
            "mark": self.mark.to_vega_lite(),
            "encoding": Value::Object(encoding),
        })
    }
}

/// A complete chart: title, size, data rows and layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub rows: Vec<Value>,
    pub layers: Vec<Layer>,
}

impl ChartSpec {
    pub fn new(title: impl Into<String>, rows: Vec<Value>) -> Self {
        Self {
            title: title.into(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            rows,
            layers: Vec::new(),
        }
    }

    pub fn layer(mut self, layer: Layer) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn sized(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn mark_kinds(&self) -> Vec<MarkKind> {
        self.layers.iter().map(|l| l.mark.kind).collect()
    }

    /// Renders the chart as a Vega-Lite v5 document.
    pub fn to_vega_lite(&self) -> Value {
        let mut out = Map::new();
        out.insert("$schema".into(), json!(VEGA_LITE_SCHEMA));
        out.insert("title".into(), json!(self.title));
        out.insert("width".into(), json!(self.width));
        out.insert("height".into(), json!(self.height));
        out.insert("data".into(), json!({ "values": self.rows }));

        match self.layers.as_slice() {
            [single] => {
                if let Value::Object(layer) = single.to_vega_lite() {
                    out.extend(layer);
                }
            }
            layers => {
                let layers: Vec<Value> = layers.iter().map(Layer::to_vega_lite).collect();
                out.insert("layer".into(), Value::Array(layers));
            }
        }

        Value::Object(out)
    }
}

/// Consumer of chart descriptions.
pub trait ChartRenderer {
    /// Renders `chart` under `name`, returning where it went.
    fn render(&self, name: &str, chart: &ChartSpec) -> Result<PathBuf>;
}

/// Writes each chart as `<output_dir>/<name>.vl.json`.
#[derive(Debug, Clone)]
pub struct JsonFileRenderer {
    output_dir: PathBuf,
}

impl JsonFileRenderer {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }
}

impl ChartRenderer for JsonFileRenderer {
    fn render(&self, name: &str, chart: &ChartSpec) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir).with_context(|| {
            format!(
                "Failed to create chart directory: {}",
                self.output_dir.display()
            )
        })?;

        let path = self.output_dir.join(format!("{}.vl.json", file_stem(name)));
        let document = serde_json::to_string_pretty(&chart.to_vega_lite())
            .context("Failed to serialize chart")?;
        std::fs::write(&path, document)
            .with_context(|| format!("Failed to write chart to {}", path.display()))?;

        info!("Wrote chart '{}' to {}", chart.title, path.display());
        Ok(path)
    }
}

/// Lowercases `name` and replaces anything but letters, digits, `_` and
/// `-` with `-`. Letters outside ASCII are kept.
fn file_stem(name: &str) -> String {
    name.chars()
        .flat_map(char::to_lowercase)
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chart() -> ChartSpec {
        ChartSpec::new("Scores", vec![json!({"score": 10.0}), json!({"score": 90.0})]).layer(
            Layer::new(MarkKind::Bar)
                .x(Field::quantitative("score").binned(10).title("Score Percentage"))
                .y(Field::count().title("Frequency")),
        )
    }

    #[test]
    fn test_single_layer_vega_lite() {
        let doc = sample_chart().to_vega_lite();
        assert_eq!(doc["mark"]["type"], "bar");
        assert_eq!(doc["encoding"]["x"]["bin"]["maxbins"], 10);
        assert_eq!(doc["encoding"]["y"]["aggregate"], "count");
        assert_eq!(doc["data"]["values"].as_array().map(Vec::len), Some(2));
        assert_eq!(doc["width"], 600);
        assert!(doc.get("layer").is_none());
    }

    #[test]
    fn test_multi_layer_vega_lite() {
        let chart = sample_chart().layer(
            Layer::new(MarkKind::Text)
                .text(Field::quantitative("score").format(".1f"))
                .annotation_style(15, 10),
        );
        let doc = chart.to_vega_lite();
        let layers = doc["layer"].as_array().unwrap();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[1]["mark"]["fontWeight"], "bold");
        assert_eq!(layers[1]["encoding"]["text"]["format"], ".1f");
    }

    #[test]
    fn test_null_properties_are_emitted() {
        let field = Field::nominal("name").unsorted().without_legend().to_vega_lite();
        assert!(field["sort"].is_null());
        assert!(field.as_object().unwrap().contains_key("sort"));
        assert!(field.as_object().unwrap().contains_key("legend"));
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("CS101 boxplot"), "cs101-boxplot");
        assert_eq!(file_stem("a/b.c"), "a-b-c");
        assert_eq!(file_stem("ΦΥΣ101 Histogram"), "φυσ101-histogram");
        assert_ne!(file_stem("ΦΥΣ101"), file_stem("ΜΑΘ101"));
    }

    #[test]
    fn test_json_file_renderer_writes_document() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = JsonFileRenderer::new(dir.path().join("charts"));

        let path = renderer.render("Quiz 1", &sample_chart()).unwrap();

        assert!(path.ends_with("quiz-1.vl.json"));
        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["title"], "Scores");
    }
}
