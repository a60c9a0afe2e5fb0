//! Face and ID-document redaction for video frame streams.
//!
//! Each area is split into `domain` (traits and pure logic) and
//! `infrastructure` (ONNX Runtime, image codecs, files).

pub mod shared {
    pub mod bounding_box;
    pub mod config;
    pub mod constants;
    pub mod error;
    pub mod frame;
}

pub mod detection {
    pub mod domain {
        pub mod document_tracker;
        pub mod face_roles;
        pub mod object_detector;
    }
    pub mod infrastructure;
}

pub mod blurring {
    pub mod domain {
        pub mod frame_blurrer;
    }
    pub mod infrastructure;
}

pub mod rendering;

pub mod pipeline {
    pub mod pipeline_logger;
    pub mod redact_frame_use_case;
    pub mod infrastructure {
        pub mod latest_frame_executor;
    }
}

pub mod video {
    pub mod domain {
        pub mod frame_codec;
        pub mod frame_reader;
        pub mod image_writer;
    }
    pub mod infrastructure {
        pub mod image_file_writer;
        pub mod image_sequence_reader;
        pub mod jpeg_frame_codec;
    }
}
