//! Decoded input peripherals.
//!
//! Receivers decode raw bytes into [`OperatorInput`], [`VideoLinkInput`] or
//! [`VisionInput`] on their own schedule. The dispatcher polls them once per
//! cycle; [`Snapshot::fresh`] tells it whether a new sample arrived since the
//! previous poll.
//!
//! [`VisionInput`]: twinboard_types::VisionInput

use twinboard_types::{OperatorInput, Snapshot, VideoLinkInput};

pub trait InputSource<T>: Send {
    /// Latest decoded sample. Clears the fresh flag.
    fn latest_snapshot(&mut self) -> Snapshot<T>;
}

impl<T, S: InputSource<T> + ?Sized> InputSource<T> for Box<S> {
    fn latest_snapshot(&mut self) -> Snapshot<T> {
        (**self).latest_snapshot()
    }
}

/// Presents a video-transmitter receiver as an operator receiver, so the
/// dispatcher runs the same mapping whichever link the operator is on.
///
/// Freshness passes through unchanged: a silent video link goes offline
/// exactly like a silent remote.
pub struct VideoLinkOperator<S> {
    link: S,
}

impl<S> VideoLinkOperator<S> {
    pub fn new(link: S) -> Self {
        Self { link }
    }
}

impl<S: InputSource<VideoLinkInput>> InputSource<OperatorInput> for VideoLinkOperator<S> {
    fn latest_snapshot(&mut self) -> Snapshot<OperatorInput> {
        self.link.latest_snapshot().map(OperatorInput::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimInput;
    use twinboard_types::{KeyMask, SwitchPosition};

    #[test]
    fn video_link_frames_arrive_as_keyboard_input() {
        let link = SimInput::<VideoLinkInput>::new();
        let mut operator = VideoLinkOperator::new(link.clone());

        link.push(VideoLinkInput {
            mouse_y: -4,
            mouse_right: true,
            keys: KeyMask(KeyMask::Q),
            ..Default::default()
        });
        let snapshot = operator.latest_snapshot();
        assert!(snapshot.fresh);
        assert_eq!(snapshot.value.switch_left, SwitchPosition::Up);
        assert_eq!(snapshot.value.mouse_y, -4);
        assert!(snapshot.value.mouse_right);
        assert!(snapshot.value.keys.pressed(KeyMask::Q));

        let again = operator.latest_snapshot();
        assert!(!again.fresh);
        assert_eq!(again.value, snapshot.value);
    }

    #[test]
    fn boxed_link_works_as_a_source() {
        let link = SimInput::<VideoLinkInput>::new();
        let boxed: Box<dyn InputSource<VideoLinkInput>> = Box::new(link.clone());
        let mut operator: Box<dyn InputSource<OperatorInput>> =
            Box::new(VideoLinkOperator::new(boxed));
        assert!(!operator.latest_snapshot().fresh);
        link.push(VideoLinkInput::default());
        assert!(operator.latest_snapshot().fresh);
    }
}
