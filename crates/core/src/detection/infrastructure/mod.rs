pub mod deadline_detection_source;
pub mod recorded_detection_source;
