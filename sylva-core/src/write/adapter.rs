//! Application-side document sources for the write path.
//!
//! A writer never walks the application's data model. Instead the
//! application implements [`DocumentSource`] and hands out one
//! [`ObjectSource`] per top-level object; the driver in
//! [`write_document`](crate::write::write_document) turns those into the
//! event stream the receiver validates. Sources declare how many members
//! they will produce, and the driver cross-checks the declaration against
//! what actually arrives, so a lying adapter fails with
//! [`Error::Inconsistent`] instead of writing a truncated file.

use crate::error::{Error, Result};
use crate::event::{Event, Id, Topology};
use crate::write::receiver::Receiver;
use crate::write::EventSink;

/// Where adapter-produced events go.
///
/// Object safe, so sources never depend on the concrete sink type behind
/// the receiver.
pub trait EventTarget {
    fn add(&mut self, event: &Event) -> Result<()>;
}

/// One writable top-level object: an OTU list, a matrix, or a tree group.
pub trait ObjectSource {
    /// The start event of this object, carrying its id, label, and links.
    fn start_event(&self) -> Event;

    /// Declared member count, checked against what [`ids`](Self::ids)
    /// actually yields.
    fn count(&self) -> u64;

    /// Member ids in document order, produced lazily.
    fn ids(&self) -> Box<dyn Iterator<Item = Id> + '_>;

    /// Emit the content events of one member.
    fn emit_content(&self, id: &Id, out: &mut dyn EventTarget) -> Result<()>;

    /// Annotations attached to the object itself, emitted right after its
    /// start event.
    fn write_metadata(&self, out: &mut dyn EventTarget) -> Result<()> {
        let _ = out;
        Ok(())
    }
}

/// A complete document for writing.
pub trait DocumentSource {
    fn otu_lists(&self) -> Vec<&dyn ObjectSource>;
    fn matrices(&self) -> Vec<&dyn ObjectSource>;
    fn tree_groups(&self) -> Vec<&dyn ObjectSource>;

    /// Annotations attached to the document itself.
    fn write_metadata(&self, out: &mut dyn EventTarget) -> Result<()> {
        let _ = out;
        Ok(())
    }
}

/// Write one object: start event, object metadata, every member's content,
/// end event. The start event must actually open something, every yielded
/// id must produce at least one event, and the declared count must match
/// the ids yielded.
pub(crate) fn write_object<S: EventSink>(
    object: &dyn ObjectSource,
    receiver: &mut Receiver<S>,
) -> Result<()> {
    let start = object.start_event();
    if start.topology() != Topology::Start {
        return Err(Error::Inconsistent(format!(
            "object source opened with a sole {} event",
            start.content_type()
        )));
    }
    let close = start.content_type();
    receiver.add(&start)?;
    object.write_metadata(receiver)?;

    let mut yielded = 0u64;
    for id in object.ids() {
        let before = receiver.delivered();
        object.emit_content(&id, receiver)?;
        if receiver.delivered() == before {
            return Err(Error::Inconsistent(format!(
                "member {id} produced no content"
            )));
        }
        yielded += 1;
    }
    if yielded != object.count() {
        return Err(Error::Inconsistent(format!(
            "object declared {} member(s) but its iterator yielded {yielded}",
            object.count()
        )));
    }
    receiver.add(&Event::End(close))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ContentType;

    fn id(s: &str) -> Id {
        Id::new(s).unwrap()
    }

    /// Records everything it is handed; expresses nothing extra.
    #[derive(Default)]
    struct RecordingSink {
        events: Vec<Event>,
    }

    impl EventSink for RecordingSink {
        fn handle_event(&mut self, event: &Event, _parent: Option<ContentType>) -> Result<()> {
            self.events.push(event.clone());
            Ok(())
        }
    }

    /// An OTU list source with a configurable lie in its declared count.
    struct ListSource {
        declared: u64,
        members: Vec<(Id, Option<String>)>,
        silent_member: Option<Id>,
    }

    impl ListSource {
        fn new(members: &[(&str, Option<&str>)]) -> Self {
            let members: Vec<(Id, Option<String>)> = members
                .iter()
                .map(|(i, l)| (id(i), l.map(str::to_string)))
                .collect();
            ListSource {
                declared: members.len() as u64,
                members,
                silent_member: None,
            }
        }
    }

    impl ObjectSource for ListSource {
        fn start_event(&self) -> Event {
            Event::OtuListStart { id: id("otus1"), label: None }
        }

        fn count(&self) -> u64 {
            self.declared
        }

        fn ids(&self) -> Box<dyn Iterator<Item = Id> + '_> {
            Box::new(self.members.iter().map(|(id, _)| id.clone()))
        }

        fn emit_content(&self, member: &Id, out: &mut dyn EventTarget) -> Result<()> {
            if self.silent_member.as_ref() == Some(member) {
                return Ok(());
            }
            let label = self
                .members
                .iter()
                .find(|(id, _)| id == member)
                .and_then(|(_, label)| label.clone());
            out.add(&Event::OtuStart { id: member.clone(), label })?;
            out.add(&Event::End(ContentType::Otu))
        }
    }

    fn run(source: &ListSource) -> Result<Vec<Event>> {
        let mut receiver = Receiver::new(RecordingSink::default());
        receiver.add(&Event::DocumentStart)?;
        write_object(source, &mut receiver)?;
        receiver.add(&Event::End(ContentType::Document))?;
        Ok(receiver.finish()?.events)
    }

    #[test]
    fn test_object_written_between_start_and_end() {
        let source = ListSource::new(&[("t1", Some("A")), ("t2", Some("B"))]);
        let events = run(&source).unwrap();
        let shape: Vec<ContentType> = events.iter().map(Event::content_type).collect();
        assert_eq!(
            shape,
            vec![
                ContentType::Document,
                ContentType::OtuList,
                ContentType::Otu,
                ContentType::Otu,
                ContentType::Otu,
                ContentType::Otu,
                ContentType::OtuList,
                ContentType::Document,
            ]
        );
    }

    #[test]
    fn test_count_mismatch_is_inconsistent() {
        let mut source = ListSource::new(&[("t1", Some("A"))]);
        source.declared = 3;
        let err = run(&source).unwrap_err();
        assert!(matches!(err, Error::Inconsistent(_)));
        assert!(err.to_string().contains("declared 3"));
    }

    #[test]
    fn test_silent_member_is_inconsistent() {
        let mut source = ListSource::new(&[("t1", Some("A")), ("t2", Some("B"))]);
        source.silent_member = Some(id("t2"));
        let err = run(&source).unwrap_err();
        assert!(err.to_string().contains("t2"));
    }

    #[test]
    fn test_sole_start_event_is_rejected() {
        struct BadStart;
        impl ObjectSource for BadStart {
            fn start_event(&self) -> Event {
                Event::SetElement { referenced: id("x") }
            }
            fn count(&self) -> u64 {
                0
            }
            fn ids(&self) -> Box<dyn Iterator<Item = Id> + '_> {
                Box::new(std::iter::empty())
            }
            fn emit_content(&self, _id: &Id, _out: &mut dyn EventTarget) -> Result<()> {
                Ok(())
            }
        }

        let mut receiver = Receiver::new(RecordingSink::default());
        receiver.add(&Event::DocumentStart).unwrap();
        let err = write_object(&BadStart, &mut receiver).unwrap_err();
        assert!(matches!(err, Error::Inconsistent(_)));
    }
}
