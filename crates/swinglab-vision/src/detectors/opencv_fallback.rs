//! Classical OpenCV fallbacks for when the neural detector finds nothing.

use std::f64::consts::PI;

use image::{GrayImage, RgbImage};
use opencv::core::{self as cv, KeyPoint, Mat, Size, Vec4i, Vector};
use opencv::features2d::{SimpleBlobDetector, SimpleBlobDetector_Params};
use opencv::imgproc;
use opencv::prelude::*;
use swinglab_models::{Detection, DetectionMethod, Point, PoseLandmarks};
use tracing::trace;

use super::ball::ball_from_circle;
use super::bat::{hand_region, line_detection, longest_line};
use super::{BallDetector, BatDetector};
use crate::error::{VisionError, VisionResult};

fn cv_err(e: opencv::Error) -> VisionError {
    VisionError::detection_failed(format!("OpenCV: {e}"))
}

fn gray_mat(gray: &GrayImage) -> VisionResult<Mat> {
    let mut mat = Mat::zeros(gray.height() as i32, gray.width() as i32, cv::CV_8UC1)
        .and_then(|m| m.to_mat())
        .map_err(cv_err)?;
    mat.data_bytes_mut()
        .map_err(cv_err)?
        .copy_from_slice(gray.as_raw());
    Ok(mat)
}

/// Canny edges then probabilistic Hough; segments as `[x1, y1, x2, y2]`.
fn hough_segments(gray: &GrayImage, threshold: i32, min_length: f64) -> VisionResult<Vec<[f64; 4]>> {
    let src = gray_mat(gray)?;
    let mut edges = Mat::default();
    imgproc::canny_def(&src, &mut edges, 50.0, 150.0).map_err(cv_err)?;

    let mut lines: Vector<Vec4i> = Vector::new();
    imgproc::hough_lines_p(&edges, &mut lines, 1.0, PI / 180.0, threshold, min_length, 10.0)
        .map_err(cv_err)?;

    Ok(lines
        .iter()
        .map(|l| [l[0] as f64, l[1] as f64, l[2] as f64, l[3] as f64])
        .collect())
}

/// Bat as the longest straight edge, first near the lead hand, then anywhere.
#[derive(Debug, Clone, Default)]
pub struct HoughBatDetector;

impl BatDetector for HoughBatDetector {
    fn detect_bat(
        &self,
        frame: &RgbImage,
        pose: Option<&PoseLandmarks>,
    ) -> VisionResult<Option<Detection>> {
        let gray = image::imageops::grayscale(frame);

        if let Some(region) = pose.and_then(|p| hand_region(p, frame.dimensions())) {
            let (x, y) = (region.x1 as u32, region.y1 as u32);
            let crop = image::imageops::crop_imm(
                &gray,
                x,
                y,
                region.width() as u32,
                region.height() as u32,
            )
            .to_image();

            let segments = hough_segments(&crop, 30, 20.0)?;
            if let Some([x1, y1, x2, y2]) = longest_line(&segments) {
                let (ox, oy) = (x as f64, y as f64);
                trace!(segments = segments.len(), "Bat found near hands");
                return Ok(Some(line_detection(
                    [x1 + ox, y1 + oy, x2 + ox, y2 + oy],
                    0.6,
                    DetectionMethod::Mediapipe,
                )));
            }
        }

        let segments = hough_segments(&gray, 50, 30.0)?;
        Ok(longest_line(&segments).map(|line| line_detection(line, 0.5, DetectionMethod::Hough)))
    }
}

/// Ball as the largest bright round blob.
#[derive(Debug, Clone, Default)]
pub struct BlobBallDetector;

impl BlobBallDetector {
    fn params() -> VisionResult<SimpleBlobDetector_Params> {
        let mut params = SimpleBlobDetector_Params::default().map_err(cv_err)?;
        params.filter_by_color = true;
        params.blob_color = 255;
        params.filter_by_area = true;
        params.min_area = 10.0;
        params.max_area = 5000.0;
        params.filter_by_circularity = true;
        params.min_circularity = 0.5;
        params.filter_by_convexity = true;
        params.min_convexity = 0.5;
        params.filter_by_inertia = true;
        params.min_inertia_ratio = 0.3;
        Ok(params)
    }
}

impl BallDetector for BlobBallDetector {
    fn detect_ball(&self, frame: &RgbImage) -> VisionResult<Option<Detection>> {
        let gray = gray_mat(&image::imageops::grayscale(frame))?;
        let mut blurred = Mat::default();
        imgproc::gaussian_blur_def(&gray, &mut blurred, Size::new(9, 9), 2.0).map_err(cv_err)?;

        let mut detector = SimpleBlobDetector::create(Self::params()?).map_err(cv_err)?;
        let mut keypoints: Vector<KeyPoint> = Vector::new();
        detector
            .detect(&blurred, &mut keypoints, &cv::no_array())
            .map_err(cv_err)?;

        let largest = keypoints
            .iter()
            .max_by(|a, b| a.size().total_cmp(&b.size()));

        Ok(largest.map(|kp| {
            let pt = kp.pt();
            ball_from_circle(
                Point::new(pt.x as f64, pt.y as f64),
                kp.size() as f64 / 2.0,
                0.6,
                DetectionMethod::Blob,
            )
        }))
    }
}
