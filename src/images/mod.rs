pub mod services;

pub use services::{upload_and_link_image, UploadItem};
