//! Form fixtures for job submissions.

#![allow(dead_code)]

use axum_test::multipart::{MultipartForm, Part};

pub fn image_part(file_name: &str, data: Vec<u8>) -> Part {
    Part::bytes(data).file_name(file_name).mime_type("image/jpeg")
}

/// A job with one front-left tyre change and two descriptions.
pub fn front_left_job(reg_number: &str, user: &str) -> MultipartForm {
    MultipartForm::new()
        .add_text("RegNumber", reg_number)
        .add_text("User", user)
        .add_text("JobDescriptions", "Replaced front left tyre")
        .add_text("JobDescriptions", "Checked pressures")
        .add_text("TyreChanges[0].TyrePosition", "front-left")
        .add_part("TyreChanges[0].PreImage", image_part("before.jpg", b"pre-bytes".to_vec()))
        .add_part("TyreChanges[0].PostImage", image_part("after.png", b"post-bytes".to_vec()))
}
