//! Collection of controller features and outputs for parameter regression.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

/// The controller a sample was recorded for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FeatureModel {
    Longitudinal,
    Lateral,
}

/// Receives samples of controller features and their outputs.
pub trait FeatureSink {
    /// Records a single sample.
    fn record(&mut self, model: FeatureModel, features: &[f64], output: f64);
}

/// A feature sink shared between the policies writing to it and its owner.
pub type SharedSink = Rc<RefCell<dyn FeatureSink>>;

/// A set of feature vectors and the outputs computed from them.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Dataset {
    pub features: Vec<Vec<f64>>,
    pub outputs: Vec<f64>,
}

impl Dataset {
    /// Adds a sample.
    pub fn push(&mut self, features: &[f64], output: f64) {
        self.features.push(features.to_vec());
        self.outputs.push(output);
    }

    /// The number of samples.
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    /// Whether no samples have been recorded.
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

/// An in-memory [FeatureSink] keeping one dataset per controller.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FeatureLog {
    pub longitudinal: Dataset,
    pub lateral: Dataset,
}

impl FeatureLog {
    /// Creates an empty log, ready to be attached to one or more policies.
    pub fn shared() -> Rc<RefCell<FeatureLog>> {
        Rc::new(RefCell::new(FeatureLog::default()))
    }

    /// Gets the dataset for the given controller.
    pub fn dataset(&self, model: FeatureModel) -> &Dataset {
        match model {
            FeatureModel::Longitudinal => &self.longitudinal,
            FeatureModel::Lateral => &self.lateral,
        }
    }

    /// Serialises the log as a JSON string.
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl FeatureSink for FeatureLog {
    fn record(&mut self, model: FeatureModel, features: &[f64], output: f64) {
        match model {
            FeatureModel::Longitudinal => self.longitudinal.push(features, output),
            FeatureModel::Lateral => self.lateral.push(features, output),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn log_separates_models() {
        let log = FeatureLog::shared();
        let sink: SharedSink = log.clone();
        sink.borrow_mut()
            .record(FeatureModel::Longitudinal, &[1.0, 2.0, 3.0], 4.0);
        sink.borrow_mut().record(FeatureModel::Lateral, &[0.5, 0.5], 1.0);
        sink.borrow_mut().record(FeatureModel::Lateral, &[0.0, 1.0], 2.0);

        let log = log.borrow();
        assert_eq!(log.longitudinal.len(), 1);
        assert_eq!(log.longitudinal.features[0], vec![1.0, 2.0, 3.0]);
        assert_eq!(log.dataset(FeatureModel::Lateral).outputs, vec![1.0, 2.0]);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn log_to_json() {
        let mut log = FeatureLog::default();
        log.record(FeatureModel::Longitudinal, &[1.0], 0.5);
        let json = log.to_json().unwrap();
        let parsed: FeatureLog = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, log);
    }
}
