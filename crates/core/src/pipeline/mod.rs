pub mod frame_executor;
pub mod frame_processor;
pub mod infrastructure;
pub mod pipeline_logger;
pub mod source_face;
pub mod swap_frames_use_case;
pub mod swap_image_use_case;
pub mod swap_settings;
