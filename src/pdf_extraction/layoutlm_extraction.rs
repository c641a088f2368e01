// LayoutXLM token classification: page text + boxes + raster -> span label votes
use image::{imageops::FilterType, RgbImage};
use ndarray::ArrayView2;
use ort::{
    inputs,
    session::{builder::GraphOptimizationLevel, Session},
    value::Value,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;
use tracing::{debug, info};

use super::aggregator::SpanTallies;
use super::glyphs::Page;
use super::tokenizer::{TokenWindow, WindowTokenizer};
use crate::config::{ModelConfig, MODEL_IMAGE_SIZE};
use crate::types::{BoundingBox, Error, Label, Result};

/// `id -> label` table shipped with the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    labels: HashMap<u32, Label>,
}

#[derive(Deserialize)]
struct ModelLabelConfig {
    id2label: HashMap<String, String>,
}

impl LabelTable {
    /// The DocLayNet table, ids in `Label` order.
    pub fn doclaynet() -> Self {
        Self {
            labels: Label::ALL.iter().map(|&l| (l.index() as u32, l)).collect(),
        }
    }

    /// Parse the `id2label` map of a HuggingFace model `config.json`.
    pub fn from_config_json(raw: &str) -> Result<Self> {
        let config: ModelLabelConfig = serde_json::from_str(raw)?;
        let mut labels = HashMap::with_capacity(config.id2label.len());
        for (id, name) in config.id2label {
            let id: u32 = id
                .parse()
                .map_err(|_| Error::Config(format!("label id {id:?} is not an integer")))?;
            labels.insert(id, name.parse::<Label>()?);
        }
        Ok(Self { labels })
    }

    pub fn from_config_file(path: &Path) -> Result<Self> {
        Self::from_config_json(&std::fs::read_to_string(path)?)
    }

    pub fn label(&self, id: u32) -> Result<Label> {
        self.labels.get(&id).copied().ok_or(Error::UnknownLabelId(id))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Model input for one window: ids, token boxes (clamped to 0..=1000) and mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelWindow {
    pub input_ids: Vec<i64>,
    pub bbox: Vec<[i64; 4]>,
    pub attention_mask: Vec<i64>,
}

/// The layout oracle. Returns the arg-max label id of every token position,
/// one vector per window.
pub trait TokenClassifier {
    fn predict(&mut self, windows: &[ModelWindow], image: &RgbImage) -> Result<Vec<Vec<u32>>>;

    fn labels(&self) -> &LabelTable;
}

fn model_err(err: impl Display) -> Error {
    Error::Model(err.to_string())
}

/// ONNX Runtime session around an exported LayoutXLM/DocLayNet model.
pub struct OnnxLayoutModel {
    session: Session,
    labels: LabelTable,
}

impl OnnxLayoutModel {
    pub fn load(config: &ModelConfig) -> Result<Self> {
        if !config.model_path.exists() {
            return Err(Error::Model(format!(
                "layout model not found at {}",
                config.model_path.display()
            )));
        }
        info!(model = %config.model_path.display(), "loading layout model");

        // Initialize ONNX Runtime (only needs to be done once)
        let _ = ort::init().commit();

        let session = Session::builder()
            .map_err(model_err)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(model_err)?
            .with_intra_threads(config.intra_threads)
            .map_err(model_err)?
            .commit_from_file(&config.model_path)
            .map_err(model_err)?;

        let labels = LabelTable::from_config_file(&config.label_config_path)?;
        debug!(inputs = session.inputs.len(), labels = labels.len(), "layout model ready");
        Ok(Self { session, labels })
    }
}

/// LayoutLMv2 image preprocessing: bilinear resize to 224x224, RGB -> BGR,
/// CHW layout, raw 0..255 values.
pub fn preprocess_image(image: &RgbImage) -> Vec<f32> {
    let size = MODEL_IMAGE_SIZE;
    let resized = image::imageops::resize(image, size, size, FilterType::Triangle);

    let mut tensor = Vec::with_capacity(3 * (size * size) as usize);
    for channel in [2usize, 1, 0] {
        for y in 0..size {
            for x in 0..size {
                tensor.push(f32::from(resized.get_pixel(x, y)[channel]));
            }
        }
    }
    tensor
}

/// Arg-max over the last axis of a `[1, seq, labels]` or `[seq, labels]` logits tensor.
/// Equal logits resolve to the lower id.
pub fn argmax_labels(shape: &[i64], data: &[f32]) -> Result<Vec<u32>> {
    let (seq, classes) = match shape {
        [1, seq, classes] | [seq, classes] => (*seq as usize, *classes as usize),
        other => return Err(Error::Model(format!("unexpected logits shape {other:?}"))),
    };
    if data.len() < seq * classes {
        return Err(Error::Model(format!("logits buffer too short for shape {shape:?}")));
    }
    let logits = ArrayView2::from_shape((seq, classes), &data[..seq * classes]).map_err(model_err)?;

    Ok(logits
        .outer_iter()
        .map(|row| {
            let mut best = 0;
            for (i, &value) in row.iter().enumerate() {
                if value > row[best] {
                    best = i;
                }
            }
            best as u32
        })
        .collect())
}

impl TokenClassifier for OnnxLayoutModel {
    fn predict(&mut self, windows: &[ModelWindow], image: &RgbImage) -> Result<Vec<Vec<u32>>> {
        let pixels = preprocess_image(image);
        let side = MODEL_IMAGE_SIZE as usize;
        let mut predictions = Vec::with_capacity(windows.len());

        for window in windows {
            let len = window.input_ids.len();
            let bbox: Vec<i64> = window.bbox.iter().flatten().copied().collect();

            let input_ids = Value::from_array(([1_usize, len], window.input_ids.clone().into_boxed_slice()))
                .map_err(model_err)?;
            let bbox = Value::from_array(([1_usize, len, 4], bbox.into_boxed_slice())).map_err(model_err)?;
            let attention_mask =
                Value::from_array(([1_usize, len], window.attention_mask.clone().into_boxed_slice()))
                    .map_err(model_err)?;
            let image = Value::from_array(([1_usize, 3, side, side], pixels.clone().into_boxed_slice()))
                .map_err(model_err)?;

            let outputs = self
                .session
                .run(inputs![
                    "input_ids" => input_ids,
                    "bbox" => bbox,
                    "attention_mask" => attention_mask,
                    "image" => image
                ])
                .map_err(model_err)?;

            let (shape, logits) = outputs[0].try_extract_tensor::<f32>().map_err(model_err)?;
            let dims: Vec<i64> = shape.iter().copied().collect();
            predictions.push(argmax_labels(&dims, logits)?);
        }
        Ok(predictions)
    }

    fn labels(&self) -> &LabelTable {
        &self.labels
    }
}

/// Adapter between a page and the oracle: builds model windows, runs the
/// oracle and turns token labels into span votes.
pub struct LayoutClassifier<T, C> {
    tokenizer: T,
    oracle: C,
}

impl<T: WindowTokenizer, C: TokenClassifier> LayoutClassifier<T, C> {
    pub fn new(tokenizer: T, oracle: C) -> Self {
        Self { tokenizer, oracle }
    }

    pub fn classify_page(&mut self, page: &Page) -> Result<SpanTallies> {
        let mut tallies = SpanTallies::new();
        if page.glyphs.is_empty() {
            debug!(page = page.index, "no glyphs, skipping classification");
            return Ok(tallies);
        }

        let windows = self.tokenizer.windows(&page.text())?;
        let model_windows = windows
            .iter()
            .map(|w| model_window(page, w))
            .collect::<Result<Vec<_>>>()?;

        let predictions = self.oracle.predict(&model_windows, &page.image)?;
        if predictions.len() != windows.len() {
            return Err(Error::Model(format!(
                "oracle returned {} windows for {} inputs",
                predictions.len(),
                windows.len()
            )));
        }

        let labels = self.oracle.labels();
        for (window, predicted) in windows.iter().zip(&predictions) {
            if predicted.len() != window.len() {
                return Err(Error::Model(format!(
                    "oracle returned {} labels for a window of {} tokens",
                    predicted.len(),
                    window.len()
                )));
            }
            for (&(start, end), &id) in window.offsets.iter().zip(predicted) {
                let label = labels.label(id)?;
                // Every glyph in the token's range votes; overlapping windows vote again
                for glyph in &page.glyphs[start..end.max(start)] {
                    tallies.vote(glyph.address, label);
                }
            }
        }
        Ok(tallies)
    }
}

/// Token boxes are the union of their glyph boxes; tokens covering no
/// characters get an all-zero box.
fn model_window(page: &Page, window: &TokenWindow) -> Result<ModelWindow> {
    let len = page.glyphs.len();
    let mut bbox = Vec::with_capacity(window.len());

    for &(start, end) in &window.offsets {
        if end > len || start > len {
            return Err(Error::OffsetOutOfRange {
                page: page.index,
                start,
                end,
                len,
            });
        }
        let token_box = page.glyphs[start..end.max(start)]
            .iter()
            .map(|g| g.bbox)
            .reduce(|acc, b| acc.union(&b))
            .unwrap_or_default();
        bbox.push(if start < end { token_box.clamped() } else { BoundingBox::default().clamped() });
    }

    Ok(ModelWindow {
        input_ids: window.input_ids.clone(),
        bbox,
        attention_mask: window.attention_mask.clone(),
    })
}
