//! Tests for adaptive moments.

use glam::{DVec2, IVec2};

use super::*;
use crate::render::{DrawMethod, PixelRenderer, Renderer};
use crate::test_utils::{gaussian_profile, render_stamp};

fn unit_weight(image: &Image) -> Image {
    image.with_pixels(vec![1.0; image.len()])
}

#[test]
fn test_recovers_gaussian_parameters() {
    let image = render_stamp(
        &gaussian_profile(1.7, 0.1, -0.05, 1000.0, DVec2::new(0.3, -0.2)),
        31,
        DrawMethod::NoPixel,
    );
    let weight = unit_weight(&image);
    let m = AdaptiveMoments::default().measure(&image, &weight, image.true_center());

    assert_eq!(m.status, STATUS_OK);
    assert!((m.flux - 1000.0).abs() < 1e-3, "flux {}", m.flux);
    assert!((m.size - 1.7).abs() < 1e-6, "size {}", m.size);
    assert!((m.g1 - 0.1).abs() < 1e-6, "g1 {}", m.g1);
    assert!((m.g2 + 0.05).abs() < 1e-6, "g2 {}", m.g2);
    assert!((m.center_u - 0.3).abs() < 1e-6);
    assert!((m.center_v + 0.2).abs() < 1e-6);
}

#[test]
fn test_center_is_relative_to_image_pos() {
    let image = render_stamp(
        &gaussian_profile(1.5, 0.0, 0.0, 1.0, DVec2::ZERO),
        25,
        DrawMethod::Auto,
    )
    .with_origin(IVec2::new(40, 60));
    let weight = unit_weight(&image);
    // The star sits at the stamp's true center (52, 72); claim it is at (51, 72.5).
    let m = AdaptiveMoments::default().measure(&image, &weight, DVec2::new(51.0, 72.5));
    assert_eq!(m.status, STATUS_OK);
    assert!((m.center_u - 1.0).abs() < 1e-6);
    assert!((m.center_v + 0.5).abs() < 1e-6);
}

#[test]
fn test_pixel_scale_converts_to_world_units() {
    let profile = gaussian_profile(1.4, 0.0, 0.0, 1.0, DVec2::new(0.5, 0.0));
    let template = Image::new_filled(61, 61, 0.0).with_scale(0.25);
    let image = PixelRenderer::default().render(
        &profile,
        &template,
        template.true_center(),
        DrawMethod::NoPixel,
    );
    let weight = unit_weight(&image);
    let m = AdaptiveMoments::default().measure(&image, &weight, image.true_center());
    // 1.4 world units = 5.6 pixels.
    assert_eq!(m.status, STATUS_OK);
    assert!((m.size - 1.4).abs() < 1e-6, "size {}", m.size);
    assert!((m.center_u - 0.5).abs() < 1e-6);
}

#[test]
fn test_masked_pixels_are_ignored() {
    let image = render_stamp(
        &gaussian_profile(1.3, 0.0, 0.0, 100.0, DVec2::ZERO),
        25,
        DrawMethod::NoPixel,
    );
    let mut corrupted = image.clone();
    let mut weight = unit_weight(&image);
    corrupted[(20, 3)] = 1e6;
    weight[(20, 3)] = 0.0;

    let estimator = AdaptiveMoments::default();
    let clean = estimator.measure(&image, &unit_weight(&image), image.true_center());
    let masked = estimator.measure(&corrupted, &weight, image.true_center());
    assert_eq!(masked.status, STATUS_OK);
    assert!((masked.size - clean.size).abs() < 1e-6);
    assert!((masked.flux - clean.flux).abs() < 1e-4);
}

#[test]
fn test_failure_statuses() {
    let estimator = AdaptiveMoments::default();

    let empty = Image::new_filled(15, 15, 0.0);
    let m = estimator.measure(&empty, &unit_weight(&empty), empty.true_center());
    assert_eq!(m.status, STATUS_NON_POSITIVE_FLUX);

    let image = render_stamp(
        &gaussian_profile(1.0, 0.0, 0.0, 1.0, DVec2::ZERO),
        15,
        DrawMethod::Auto,
    );
    let m = estimator.measure(&image, &image.zeros_like(), image.true_center());
    assert_eq!(m.status, STATUS_NO_PIXELS);

    let negative = image.with_pixels(image.iter().map(|v| -v).collect());
    let m = estimator.measure(&negative, &unit_weight(&negative), negative.true_center());
    assert_ne!(m.status, STATUS_OK);

    let short = AdaptiveMoments {
        max_iterations: 2,
        ..AdaptiveMoments::default()
    };
    let m = short.measure(&image, &unit_weight(&image), image.true_center());
    assert_eq!(m.status, STATUS_NOT_CONVERGED);
}

#[test]
fn test_into_moments_maps_status_to_error() {
    let err = MomentMeasurement::failed(STATUS_SINGULAR)
        .into_moments("model")
        .unwrap_err();
    assert_eq!(
        err,
        FitError::MeasurementFailure {
            target: "model",
            status: STATUS_SINGULAR
        }
    );

    let ok = MomentMeasurement {
        flux: 5.0,
        center_u: 0.1,
        center_v: 0.2,
        size: 1.1,
        g1: 0.3,
        g2: 0.0,
        status: STATUS_OK,
    }
    .into_moments("data")
    .unwrap();
    assert_eq!(ok.center, DVec2::new(0.1, 0.2));
    assert_eq!(ok.shear().unwrap().g1(), 0.3);
}
