use crate::models::fs_types::PreviewImage;
use serde::{Deserialize, Serialize};

/// One ranked guess among the model's output classes.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Candidate {
    #[serde(rename = "class")]
    pub label: String,
    pub confidence: f32,
}

/// One inspected image, exactly as the backend reports it.
///
/// The local preview is deliberately not a field here: it lives in
/// [`BatchRow`], so anything serialized from this type can never carry a
/// client-local handle.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PredictionResult {
    pub filename: String,
    pub prediction: String,
    pub confidence: f32,
    /// Opaque outcome tag. Absent on the single-predict wire shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Up to five candidates, descending confidence. Informational only;
    /// `prediction`/`confidence` are not derived from it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top5: Option<Vec<Candidate>>,
}

impl PredictionResult {
    /// A row is expandable iff the server attached top-5 detail.
    pub fn expandable(&self) -> bool {
        self.top5.as_ref().is_some_and(|t| !t.is_empty())
    }
}

/// Wire shape of `GET /models`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RegistrySnapshot {
    pub models: Vec<String>,
    pub current: String,
}

/// One reconciled batch row: the server result plus the locally bound
/// thumbnail, if a candidate file matched.
#[derive(Debug, Clone)]
pub struct BatchRow {
    pub result: PredictionResult,
    pub preview: Option<PreviewImage>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct BatchStats {
    pub total: usize,
    pub average_confidence_percent: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_the_batch_wire_shape() {
        let body = r#"{
            "filename": "abs.png",
            "prediction": "ABS",
            "confidence": 0.93,
            "status": "Success",
            "top5": [
                {"class": "ABS", "confidence": 0.93},
                {"class": "ESP", "confidence": 0.04}
            ]
        }"#;

        let result: PredictionResult = serde_json::from_str(body).unwrap();
        assert_eq!(result.filename, "abs.png");
        assert_eq!(result.prediction, "ABS");
        assert_eq!(result.confidence, 0.93);
        assert_eq!(result.status.as_deref(), Some("Success"));

        let top5 = result.top5.as_ref().unwrap();
        assert_eq!(top5.len(), 2);
        assert_eq!(top5[0].label, "ABS");
        assert_eq!(top5[1].label, "ESP");
        assert!(result.expandable());
    }

    #[test]
    fn absent_fields_default_on_the_single_wire_shape() {
        // The single-predict response carries no status and may omit top5.
        let body = r#"{"filename":"abs.png","prediction":"ABS","confidence":0.93}"#;

        let result: PredictionResult = serde_json::from_str(body).unwrap();
        assert_eq!(result.status, None);
        assert_eq!(result.top5, None);
        assert!(!result.expandable());
    }

    #[test]
    fn candidate_label_round_trips_under_the_wire_name() {
        let candidate: Candidate =
            serde_json::from_str(r#"{"class":"ABS","confidence":0.93}"#).unwrap();
        assert_eq!(candidate.label, "ABS");

        let json = serde_json::to_value(&candidate).unwrap();
        assert_eq!(json["class"], "ABS");
        assert!(json.get("label").is_none());
    }

    #[test]
    fn serialized_results_omit_absent_optional_fields() {
        let result = PredictionResult {
            filename: "abs.png".to_string(),
            prediction: "ABS".to_string(),
            confidence: 0.93,
            status: None,
            top5: None,
        };

        let json = serde_json::to_value(&result).unwrap();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["filename", "prediction", "confidence"]);
    }
}
