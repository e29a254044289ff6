mod affine;
mod blur;
mod canny;
mod contours;
mod glitch;
mod grayscale;
mod jpeg;
mod keypoints;
mod morphology;
mod ops;
mod pixel_sort;
mod sharpen;
mod threshold;

pub use affine::Affine;
pub use blur::Blur;
pub use canny::Canny;
pub use contours::Contours;
pub use glitch::Glitch;
pub use grayscale::Grayscale;
pub use jpeg::Jpeg;
pub use keypoints::{Detector, Keypoints};
pub use morphology::{Morphology, MorphologyOp};
pub use pixel_sort::{Axis, PixelSort};
pub use sharpen::Sharpen;
pub use threshold::{Threshold, ThresholdMode};

use std::{any::Any, borrow::Cow, sync::Arc};

use parking_lot::Mutex;

use crate::{error::Result, frame::Frame};

/// Shared handle to a filter living in an engine's chain.
pub type FilterHandle = Arc<Mutex<dyn Filter>>;

/// A named, independently configurable image transform.
///
/// Setters on implementors clamp their input; a filter cannot be put into an
/// invalid state through its public API.
pub trait Filter: Send {
    /// Stable identifier used by [`crate::Engine::find_filter`].
    fn id(&self) -> &'static str;

    fn is_enabled(&self) -> bool;

    fn set_enabled(&mut self, on: bool);

    /// The enabled transformation. Must not depend on anything but `src` and
    /// the filter's parameters.
    fn render(&self, src: &Frame) -> Result<Frame>;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Disabled filters hand the input back untouched.
    fn apply<'a>(&self, src: &'a Frame) -> Cow<'a, Frame> {
        if !self.is_enabled() {
            return Cow::Borrowed(src);
        }

        match self.render(src) {
            Ok(frame) => Cow::Owned(frame),
            Err(e) => {
                tracing::warn!(filter = self.id(), "filter failed, passing frame through: {e}");
                Cow::Borrowed(src)
            }
        }
    }
}

/// Wraps a filter into a shared handle.
///
/// Keep the typed handle for configuration and add a clone to the engine:
/// `engine.add_filter(glitch.clone() as FilterHandle)`.
pub fn shared<F: Filter + 'static>(filter: F) -> Arc<Mutex<F>> {
    Arc::new(Mutex::new(filter))
}

/// Runs `f` on the concrete filter behind `handle`, if it is an `F`.
pub fn configure<F, R>(handle: &FilterHandle, f: impl FnOnce(&mut F) -> R) -> Option<R>
where
    F: Filter + 'static,
{
    let mut guard = handle.lock();
    guard.as_any_mut().downcast_mut::<F>().map(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Frame {
        Frame::from_raw(
            4,
            2,
            3,
            (0..24).map(|v| (v * 10) as u8).collect::<Vec<_>>(),
        )
        .unwrap()
    }

    fn all_filters() -> Vec<Box<dyn Filter>> {
        vec![
            Box::new(Affine::default()),
            Box::new(Blur::default()),
            Box::new(Canny::default()),
            Box::new(Contours::default()),
            Box::new(Glitch::default()),
            Box::new(Grayscale::default()),
            Box::new(Jpeg::default()),
            Box::new(Keypoints::default()),
            Box::new(Morphology::default()),
            Box::new(PixelSort::default()),
            Box::new(Sharpen::default()),
            Box::new(Threshold::default()),
        ]
    }

    #[test]
    fn disabled_filters_are_identity() {
        let frame = sample();
        for mut filter in all_filters() {
            filter.set_enabled(false);
            match filter.apply(&frame) {
                Cow::Borrowed(out) => assert!(std::ptr::eq(out, &frame), "{}", filter.id()),
                Cow::Owned(_) => panic!("{} allocated while disabled", filter.id()),
            }
        }
    }

    #[test]
    fn enabled_filters_leave_input_untouched() {
        let frame = sample();
        let before = frame.clone();
        for mut filter in all_filters() {
            filter.set_enabled(true);
            let _ = filter.apply(&frame);
            assert_eq!(frame, before, "{} mutated its input", filter.id());
        }
    }

    #[test]
    fn ids_are_unique() {
        let mut ids: Vec<_> = all_filters().iter().map(|f| f.id()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), all_filters().len());
    }

    #[test]
    fn configure_downcasts_to_concrete_type() {
        let handle: FilterHandle = shared(Glitch::default());
        assert_eq!(configure(&handle, |g: &mut Glitch| g.set_strength(5)), Some(()));
        assert_eq!(configure(&handle, |g: &mut Glitch| g.strength()), Some(5));
        assert!(configure(&handle, |b: &mut Blur| b.ksize()).is_none());
    }
}
