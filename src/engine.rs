//! The filter chain and the acquisition loop around it.

use std::borrow::Cow;

use crate::{
    error::Result,
    filter::FilterHandle,
    frame::{DisplayImage, Frame},
    source::FrameSource,
};

/// Owns a [`FrameSource`] and an ordered filter chain.
///
/// Each tick the driver calls [`Engine::grab`] and then [`Engine::process`].
/// Filters run strictly in chain order; the chain is never reordered.
#[derive(Default)]
pub struct Engine {
    source: FrameSource,
    current: Option<Frame>,
    chain: Vec<FilterHandle>,
}

impl Engine {
    pub fn new(source: FrameSource) -> Self {
        Self {
            source,
            current: None,
            chain: Vec::new(),
        }
    }

    pub fn source(&self) -> &FrameSource {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut FrameSource {
        &mut self.source
    }

    pub fn open(&mut self) -> Result<()> {
        self.source.open()
    }

    pub fn close(&mut self) {
        self.source.close();
    }

    /// Acquires the next frame from the source and makes it current.
    ///
    /// On failure the previous frame is kept; the caller is expected to skip
    /// the tick.
    pub fn grab(&mut self) -> Result<()> {
        let frame = self.source.grab()?;
        self.current = Some(frame);
        Ok(())
    }

    /// Replaces the current frame without going through the source.
    pub fn set_source_image(&mut self, frame: Frame) {
        self.current = Some(frame);
    }

    pub fn current_frame(&self) -> Option<&Frame> {
        self.current.as_ref()
    }

    pub fn clear_filters(&mut self) {
        self.chain.clear();
    }

    /// Appends a filter. `None` is ignored.
    pub fn add_filter(&mut self, filter: impl Into<Option<FilterHandle>>) {
        if let Some(filter) = filter.into() {
            self.chain.push(filter);
        }
    }

    /// First filter in the chain with the given id.
    pub fn find_filter(&self, id: &str) -> Option<FilterHandle> {
        self.chain
            .iter()
            .find(|filter| filter.lock().id() == id)
            .cloned()
    }

    pub fn filters(&self) -> &[FilterHandle] {
        &self.chain
    }

    /// Runs the current frame through the chain without converting it.
    pub fn render(&self) -> Option<Frame> {
        let frame = self.current.as_ref()?;

        let mut cur = Cow::Borrowed(frame);
        for filter in &self.chain {
            let filter = filter.lock();
            let next = match filter.apply(&cur) {
                Cow::Owned(out) => Some(out),
                Cow::Borrowed(_) => None,
            };
            if let Some(out) = next {
                cur = Cow::Owned(out);
            }
        }
        Some(cur.into_owned())
    }

    /// Runs the chain and converts the result for display. `None` when there
    /// is no current frame or the result has no displayable layout.
    pub fn process(&self) -> Option<DisplayImage> {
        self.render()?.to_display()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.source.close();
    }
}
