use ilaot_core::{ExceptionHandler, HandlerKind};

use crate::regions::{RegionTier, active_region, exception_target, receives_exception};
use crate::test_utils::catch;

fn nested() -> Vec<ExceptionHandler> {
    vec![catch(0, 20, 20, 30), catch(5, 10, 10, 15)]
}

fn filtered() -> ExceptionHandler {
    ExceptionHandler {
        kind: HandlerKind::Filter,
        filter_start: Some(4),
        ..catch(0, 4, 8, 12)
    }
}

fn finally(try_start: u32, try_end: u32, handler_start: u32, handler_end: u32) -> ExceptionHandler {
    ExceptionHandler {
        kind: HandlerKind::Finally,
        ..catch(try_start, try_end, handler_start, handler_end)
    }
}

#[test]
fn innermost_try_wins() {
    let handlers = nested();

    let region = active_region(&handlers, 7).unwrap();
    assert_eq!(region.tier, RegionTier::Try);
    assert_eq!(region.entry(), Some(10));

    let region = active_region(&handlers, 2).unwrap();
    assert_eq!(region.entry(), Some(20));
}

#[test]
fn try_spans_take_precedence_over_handlers() {
    let handlers = nested();

    // inside the inner handler, still inside the outer try
    let region = active_region(&handlers, 12).unwrap();
    assert_eq!(region.tier, RegionTier::Try);
    assert_eq!(region.entry(), Some(20));
}

#[test]
fn handler_region_has_no_entry() {
    let handlers = nested();

    let region = active_region(&handlers, 25).unwrap();
    assert_eq!(region.tier, RegionTier::Handler);
    assert_eq!(region.entry(), None);
    assert!(active_region(&handlers, 30).is_none());
}

#[test]
fn ties_keep_the_first_clause() {
    let handlers = vec![catch(0, 10, 10, 20), finally(0, 10, 20, 30)];

    let region = active_region(&handlers, 3).unwrap();
    assert_eq!(region.handler.kind, HandlerKind::Catch);
    assert_eq!(region.entry(), Some(10));
}

#[test]
fn filter_try_enters_the_filter() {
    let handlers = vec![filtered()];

    assert_eq!(active_region(&handlers, 2).unwrap().entry(), Some(4));

    let region = active_region(&handlers, 5).unwrap();
    assert_eq!(region.tier, RegionTier::Filter);
    assert_eq!(region.entry(), None);

    assert_eq!(active_region(&handlers, 9).unwrap().tier, RegionTier::Handler);
}

#[test]
fn exception_targets() {
    let handlers = nested();

    assert_eq!(exception_target("M", &handlers, 7), "M.IL_000A");
    assert_eq!(exception_target("M", &handlers, 12), "M.IL_0014");
    assert_eq!(exception_target("M", &handlers, 25), "M__EXCEPTION_EXIT");
    assert_eq!(exception_target("M", &[], 0), "M__EXCEPTION_EXIT");
}

#[test]
fn catch_and_filter_blocks_receive_the_exception() {
    let handlers = vec![catch(0, 4, 4, 8), finally(0, 8, 8, 12)];

    assert!(receives_exception(&handlers, 4));
    assert!(!receives_exception(&handlers, 8));
    assert!(!receives_exception(&handlers, 0));

    let filter = [filtered()];
    assert!(receives_exception(&filter, 4));
    assert!(receives_exception(&filter, 8));
}
