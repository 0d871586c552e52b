//! Face identity clustering, timeline aggregation and merge engine.
//!
//! Detections produced by an external recognition model are grouped into
//! identities by nearest-centroid matching, then summarised into per-person
//! timelines and best shots for downstream editing tools.

pub mod aggregation {
    pub mod domain {
        pub mod aggregator;
        pub mod identity_summary;
    }
}

pub mod clustering {
    pub mod domain {
        pub mod centroid;
        pub mod clustering_session;
        pub mod identity;
        pub mod identity_error;
        pub mod identity_links;
        pub mod merge_coordinator;
    }
    pub mod infrastructure {
        pub mod json_session_store;
    }
}

pub mod detection {
    pub mod domain {
        pub mod detection_source;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod analysis_error;
    pub mod analysis_logger;
    pub mod analyze_video_use_case;
    pub mod shared_session;
}

pub mod shared {
    pub mod analysis_config;
    pub mod bounding_box;
    pub mod constants;
    pub mod detection;
    pub mod math;
    pub mod time_range;
}
