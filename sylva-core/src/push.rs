//! Push-style delivery of document events.
//!
//! The pull interface in [`crate::read`] hands out one event per call. Some
//! consumers are easier to write inverted: register listeners, then drive
//! the reader to completion. Listeners control the pace. Returning
//! [`ControlFlow::Break`] stops the drive at that event; the reader keeps
//! its position, so a later drive resumes where the last one stopped.

use std::ops::ControlFlow;

use crate::error::Result;
use crate::event::Event;
use crate::read::EventReader;

/// A synchronous consumer of document events.
///
/// Implemented for closures, so a `FnMut(&Event) -> ControlFlow<()>`
/// registers directly.
pub trait Listener {
    fn handle(&mut self, event: &Event) -> ControlFlow<()>;
}

impl<F> Listener for F
where
    F: FnMut(&Event) -> ControlFlow<()>,
{
    fn handle(&mut self, event: &Event) -> ControlFlow<()> {
        self(event)
    }
}

/// Forward every event from `reader` to `listeners` in registration order.
///
/// Stops when the reader is drained or a listener breaks; later listeners
/// do not see the event a drive broke on. Reader errors surface unchanged,
/// so a recoverable [`Unsupported`](crate::error::Error::Unsupported) can
/// be handled by calling `drive` again.
pub fn drive(
    reader: &mut dyn EventReader,
    listeners: &mut [&mut dyn Listener],
) -> Result<()> {
    while let Some(event) = reader.next_event()? {
        for listener in listeners.iter_mut() {
            if listener.handle(&event).is_break() {
                return Ok(());
            }
        }
    }
    Ok(())
}

/// Drain `reader` until `predicate` matches, returning the matching event.
///
/// Events before the match are discarded. Returns `None` when the reader
/// ends first.
pub fn read_until(
    reader: &mut dyn EventReader,
    mut predicate: impl FnMut(&Event) -> bool,
) -> Result<Option<Event>> {
    while let Some(event) = reader.next_event()? {
        if predicate(&event) {
            return Ok(Some(event));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use crate::event::ContentType;
    use crate::params::ParameterMap;
    use crate::read::newick::NewickReader;

    #[test]
    fn test_listeners_run_in_registration_order() {
        let log = RefCell::new(Vec::new());
        let mut first = |event: &Event| {
            log.borrow_mut().push(("first", event.content_type()));
            ControlFlow::Continue(())
        };
        let mut second = |event: &Event| {
            log.borrow_mut().push(("second", event.content_type()));
            ControlFlow::Continue(())
        };

        let mut reader = NewickReader::from_text("(A,B);", ParameterMap::new());
        drive(&mut reader, &mut [&mut first, &mut second]).unwrap();

        let log = log.into_inner();
        assert_eq!(log[0], ("first", ContentType::Document));
        assert_eq!(log[1], ("second", ContentType::Document));
        // Every event reaches both listeners, first before second.
        assert_eq!(log.len() % 2, 0);
        for pair in log.chunks(2) {
            assert_eq!(pair[0].0, "first");
            assert_eq!(pair[1].0, "second");
            assert_eq!(pair[0].1, pair[1].1);
        }
        assert_eq!(log.last().map(|(_, c)| *c), Some(ContentType::Document));
    }

    #[test]
    fn test_break_stops_the_drive() {
        let mut seen = 0;
        let mut counter = |_: &Event| {
            seen += 1;
            if seen == 3 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        };

        let mut reader = NewickReader::from_text("(A,(B,C));", ParameterMap::new());
        drive(&mut reader, &mut [&mut counter]).unwrap();

        // The reader was not drained; the rest is still there to pull.
        assert!(reader.next_event().unwrap().is_some());
    }

    #[test]
    fn test_read_until_positions_the_reader() {
        let mut reader = NewickReader::from_text("(A,B);", ParameterMap::new());

        let found = read_until(&mut reader, |event| {
            matches!(event, Event::TreeStart { .. })
        })
        .unwrap();
        assert!(matches!(found, Some(Event::TreeStart { .. })));

        // The next pull continues inside the tree.
        let next = reader.next_event().unwrap().unwrap();
        assert!(matches!(next, Event::NodeStart { .. }));
    }

    #[test]
    fn test_read_until_without_match_drains() {
        let mut reader = NewickReader::from_text("(A,B);", ParameterMap::new());

        let found = read_until(&mut reader, |event| {
            matches!(event, Event::NetworkStart { .. })
        })
        .unwrap();
        assert!(found.is_none());
        assert!(reader.next_event().unwrap().is_none());
    }
}
