//! Export lifecycle events
//!
//! Hosts hook into an export by registering one handler per [`ExportEvent`].
//! Handlers receive an [`EventContext`] and may adjust the sheet layout
//! through its [`SheetOptions`]. Dispatch order for one export:
//!
//! 1. `BeforeExport`: before the first record is read
//! 2. `BeforeSheet`: before the sheet is laid out
//! 3. `AfterSheet`: after the last row
//! 4. `BeforeWriting`: before the file is committed
//!
//! A failing handler aborts the export.

use crate::config::DEFAULT_SHEET_TITLE;
use crate::error::{ExportError, Result};
use indexmap::IndexMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Point in the export lifecycle a handler runs at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportEvent {
    /// Before any record is read
    BeforeExport,
    /// Before the file is committed
    BeforeWriting,
    /// Before the sheet is laid out
    BeforeSheet,
    /// After the last row is written
    AfterSheet,
}

impl ExportEvent {
    /// All events, in declaration order
    pub const ALL: [ExportEvent; 4] = [
        ExportEvent::BeforeExport,
        ExportEvent::BeforeWriting,
        ExportEvent::BeforeSheet,
        ExportEvent::AfterSheet,
    ];

    /// Event name as used for registration
    pub fn name(self) -> &'static str {
        match self {
            ExportEvent::BeforeExport => "BeforeExport",
            ExportEvent::BeforeWriting => "BeforeWriting",
            ExportEvent::BeforeSheet => "BeforeSheet",
            ExportEvent::AfterSheet => "AfterSheet",
        }
    }
}

impl fmt::Display for ExportEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExportEvent {
    type Err = ExportError;

    /// Parse an event name, ignoring ASCII case
    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim();
        ExportEvent::ALL
            .into_iter()
            .find(|event| event.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| ExportError::InvalidEvent(s.to_string()))
    }
}

/// Sheet layout that handlers may adjust
#[derive(Debug, Clone, PartialEq)]
pub struct SheetOptions {
    /// Worksheet title
    pub title: String,
    /// Keep the heading row visible while scrolling
    pub freeze_header: bool,
    /// Render the heading row in bold
    pub bold_header: bool,
    /// Add a filter dropdown to the heading row
    pub auto_filter: bool,
    /// Column width overrides by zero-based column index
    pub column_widths: IndexMap<usize, f64>,
}

impl SheetOptions {
    /// Options for a sheet titled `title`
    pub fn new(title: impl Into<String>) -> Self {
        SheetOptions {
            title: title.into(),
            freeze_header: false,
            bold_header: false,
            auto_filter: false,
            column_widths: IndexMap::new(),
        }
    }

    /// Override the width of one column
    pub fn set_column_width(&mut self, column: usize, width: f64) -> &mut Self {
        self.column_widths.insert(column, width);
        self
    }
}

impl Default for SheetOptions {
    fn default() -> Self {
        Self::new(DEFAULT_SHEET_TITLE)
    }
}

/// What a handler sees when it runs
pub struct EventContext<'a> {
    /// Event being dispatched
    pub event: ExportEvent,
    /// Download file name
    pub file_name: &'a str,
    /// Heading labels in column order
    pub headings: &'a [String],
    /// Number of data rows (0 before the rows are known)
    pub row_count: usize,
    /// Mutable sheet layout
    pub sheet: &'a mut SheetOptions,
}

/// Boxed event handler
pub type EventHandler = Box<dyn Fn(&mut EventContext<'_>) -> Result<()>>;

/// Handlers keyed by event, at most one per event
#[derive(Default)]
pub struct RegisteredEvents {
    handlers: IndexMap<ExportEvent, EventHandler>,
}

impl RegisteredEvents {
    /// Create an empty registration map
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `event`, builder style
    pub fn on<F>(mut self, event: ExportEvent, handler: F) -> Self
    where
        F: Fn(&mut EventContext<'_>) -> Result<()> + 'static,
    {
        self.insert(event, handler);
        self
    }

    /// Register `handler` for `event`, replacing any previous handler
    pub fn insert<F>(&mut self, event: ExportEvent, handler: F)
    where
        F: Fn(&mut EventContext<'_>) -> Result<()> + 'static,
    {
        self.handlers.insert(event, Box::new(handler));
    }

    /// Register a handler by event name
    pub fn insert_named<F>(&mut self, name: &str, handler: F) -> Result<()>
    where
        F: Fn(&mut EventContext<'_>) -> Result<()> + 'static,
    {
        let event = name.parse()?;
        self.insert(event, handler);
        Ok(())
    }

    /// Check if a handler is registered for `event`
    pub fn contains(&self, event: ExportEvent) -> bool {
        self.handlers.contains_key(&event)
    }

    /// Registered events in registration order
    pub fn events(&self) -> impl Iterator<Item = ExportEvent> + '_ {
        self.handlers.keys().copied()
    }

    /// Get number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if no handlers are registered
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the handler for `context.event`, if any.
    ///
    /// Handler errors are wrapped in [`ExportError::EventHandler`].
    pub fn dispatch(&self, context: &mut EventContext<'_>) -> Result<()> {
        let event = context.event;
        let Some(handler) = self.handlers.get(&event) else {
            return Ok(());
        };

        debug!(%event, file = context.file_name, "Dispatching export event");
        handler(context).map_err(|source| ExportError::EventHandler {
            event: event.to_string(),
            source: Box::new(source),
        })
    }
}

impl fmt::Debug for RegisteredEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.handlers.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn context<'a>(event: ExportEvent, sheet: &'a mut SheetOptions) -> EventContext<'a> {
        EventContext {
            event,
            file_name: "users.xlsx",
            headings: &[],
            row_count: 0,
            sheet,
        }
    }

    #[test]
    fn test_parse_event_names() {
        assert_eq!("BeforeSheet".parse::<ExportEvent>().unwrap(), ExportEvent::BeforeSheet);
        assert_eq!("aftersheet".parse::<ExportEvent>().unwrap(), ExportEvent::AfterSheet);
        assert!(matches!(
            "AfterEverything".parse::<ExportEvent>(),
            Err(ExportError::InvalidEvent(_))
        ));

        for event in ExportEvent::ALL {
            assert_eq!(event.to_string().parse::<ExportEvent>().unwrap(), event);
        }
    }

    #[test]
    fn test_dispatch_runs_matching_handler() {
        let events = RegisteredEvents::new().on(ExportEvent::BeforeSheet, |ctx| {
            ctx.sheet.freeze_header = true;
            ctx.sheet.set_column_width(0, 30.0);
            Ok(())
        });

        let mut sheet = SheetOptions::default();
        events.dispatch(&mut context(ExportEvent::AfterSheet, &mut sheet)).unwrap();
        assert!(!sheet.freeze_header);

        events.dispatch(&mut context(ExportEvent::BeforeSheet, &mut sheet)).unwrap();
        assert!(sheet.freeze_header);
        assert_eq!(sheet.column_widths.get(&0), Some(&30.0));
    }

    #[test]
    fn test_insert_replaces_handler() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut events = RegisteredEvents::new();

        let log = Rc::clone(&calls);
        events.insert(ExportEvent::BeforeExport, move |_| {
            log.borrow_mut().push("first");
            Ok(())
        });
        let log = Rc::clone(&calls);
        events
            .insert_named("BeforeExport", move |_| {
                log.borrow_mut().push("second");
                Ok(())
            })
            .unwrap();

        let mut sheet = SheetOptions::default();
        events.dispatch(&mut context(ExportEvent::BeforeExport, &mut sheet)).unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(*calls.borrow(), vec!["second"]);
    }

    #[test]
    fn test_insert_named_rejects_unknown_event() {
        let mut events = RegisteredEvents::new();
        let result = events.insert_named("OnTuesday", |_| Ok(()));
        assert!(matches!(result, Err(ExportError::InvalidEvent(_))));
        assert!(events.is_empty());
    }

    #[test]
    fn test_handler_error_is_wrapped() {
        let events = RegisteredEvents::new().on(ExportEvent::AfterSheet, |_| {
            Err(ExportError::InvalidState("nope".to_string()))
        });

        let mut sheet = SheetOptions::default();
        let err = events
            .dispatch(&mut context(ExportEvent::AfterSheet, &mut sheet))
            .unwrap_err();

        match err {
            ExportError::EventHandler { event, source } => {
                assert_eq!(event, "AfterSheet");
                assert!(matches!(*source, ExportError::InvalidState(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
