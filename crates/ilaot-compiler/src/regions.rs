//! Exception region lookup for a single IL offset.

use ilaot_core::naming;
use ilaot_core::{ExceptionHandler, HandlerKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionTier {
    Try,
    Handler,
    Filter,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActiveRegion<'a> {
    pub handler: &'a ExceptionHandler,
    pub tier: RegionTier,
}

impl ActiveRegion<'_> {
    /// IL offset control transfers to when a call fails inside this region.
    /// Only try regions have one; failures inside handlers leave the method.
    pub fn entry(&self) -> Option<u32> {
        if self.tier != RegionTier::Try {
            return None;
        }
        match (self.handler.kind, self.handler.filter_start) {
            (HandlerKind::Filter, Some(start)) => Some(start),
            _ => Some(self.handler.handler_start),
        }
    }
}

fn narrowest<'a>(
    handlers: &'a [ExceptionHandler],
    span: impl Fn(&ExceptionHandler) -> Option<(u32, u32)>,
    offset: u32,
) -> Option<&'a ExceptionHandler> {
    let mut best: Option<(&ExceptionHandler, u32)> = None;
    for handler in handlers {
        let Some((start, end)) = span(handler) else {
            continue;
        };
        if offset < start || offset >= end {
            continue;
        }
        let width = end - start;
        if best.is_none_or(|(_, w)| width < w) {
            best = Some((handler, width));
        }
    }
    best.map(|(handler, _)| handler)
}

/// Innermost region containing `offset`: try spans first, then handler
/// spans, then filter blocks. Ties keep the first clause.
pub fn active_region(handlers: &[ExceptionHandler], offset: u32) -> Option<ActiveRegion<'_>> {
    if let Some(handler) = narrowest(handlers, |h| Some((h.try_start, h.try_end)), offset) {
        return Some(ActiveRegion {
            handler,
            tier: RegionTier::Try,
        });
    }
    if let Some(handler) = narrowest(
        handlers,
        |h| Some((h.handler_start, h.handler_end)),
        offset,
    ) {
        return Some(ActiveRegion {
            handler,
            tier: RegionTier::Handler,
        });
    }

    // latest filter start at or before the offset, bounded by its handler
    let mut best: Option<&ExceptionHandler> = None;
    for handler in handlers {
        let Some(start) = handler.filter_start else {
            continue;
        };
        if handler.kind != HandlerKind::Filter || start > offset || offset >= handler.handler_start {
            continue;
        }
        if best.is_none_or(|b| b.filter_start.is_some_and(|s| start > s)) {
            best = Some(handler);
        }
    }
    best.map(|handler| ActiveRegion {
        handler,
        tier: RegionTier::Filter,
    })
}

/// Label a failing call at `offset` jumps to.
pub fn exception_target(method_label: &str, handlers: &[ExceptionHandler], offset: u32) -> String {
    match active_region(handlers, offset).and_then(|r| r.entry()) {
        Some(entry) => naming::instruction_label(method_label, entry),
        None => naming::exception_exit_label(method_label),
    }
}

/// Whether `offset` is where a catch or filter block receives the exception.
pub fn receives_exception(handlers: &[ExceptionHandler], offset: u32) -> bool {
    handlers.iter().any(|h| match h.kind {
        HandlerKind::Catch => h.handler_start == offset,
        HandlerKind::Filter => h.filter_start == Some(offset) || h.handler_start == offset,
        HandlerKind::Finally | HandlerKind::Fault => false,
    })
}
