mod support;

use std::sync::Arc;

use support::{Command, FakeRegistry, RecordingSurface, url};
use transfer_board::controller::dispatcher::{AggregateAction, ConfigChange, TaskCommand};
use transfer_board::controller::error::ControlError;
use transfer_board::registry::{TaskEventKind, TaskRegistry, TaskStatus};
use transfer_board::render::{SlotId, StatusIcon};
use transfer_board::TaskListController;

fn controller(registry: &Arc<FakeRegistry>) -> TaskListController<RecordingSurface> {
    let mut controller = TaskListController::new(
        registry.clone() as Arc<dyn TaskRegistry>,
        RecordingSurface::default(),
    );
    controller.initialize();
    controller
}

#[test]
fn initialize_builds_sequence_in_registry_order() {
    let registry = FakeRegistry::with_tasks(&[
        ("a.dmg", TaskStatus::Running, 0, 100),
        ("b.dmg", TaskStatus::Waiting, 0, 100),
        ("c.dmg", TaskStatus::Succeeded, 100, 100),
    ]);
    let controller = controller(&registry);

    assert_eq!(
        controller.sequence(),
        &[url("a.dmg"), url("b.dmg"), url("c.dmg")]
    );
    let surface = controller.surface();
    assert_eq!(surface.reloads, vec![3]);
    assert_eq!(
        surface.aggregate.as_ref().map(|view| view.total_count_text.as_str()),
        Some("Total tasks: 1/3")
    );
    let switches = surface.switches.expect("switches rendered");
    assert!(!switches.task_limit);
    assert!(!switches.cellular_access);
}

#[test]
fn tapping_a_running_row_only_suspends() {
    let registry = FakeRegistry::with_tasks(&[("a.dmg", TaskStatus::Running, 10, 100)]);
    let mut controller = controller(&registry);

    let command = controller.tap_row(0).unwrap();

    assert_eq!(command, Some(TaskCommand::Suspend));
    assert_eq!(registry.commands(), vec![Command::Suspend(url("a.dmg"))]);
}

#[test]
fn tapping_a_suspended_row_starts_it() {
    let registry = FakeRegistry::with_tasks(&[("a.dmg", TaskStatus::Suspended, 10, 100)]);
    let mut controller = controller(&registry);

    controller.tap_row(0).unwrap();

    assert_eq!(registry.commands(), vec![Command::Start(url("a.dmg"))]);
}

#[test]
fn tapping_a_canceled_row_restarts_it() {
    let registry = FakeRegistry::with_tasks(&[("a.dmg", TaskStatus::Canceled, 0, 100)]);
    let mut controller = controller(&registry);

    controller.tap_row(0).unwrap();

    assert_eq!(registry.commands(), vec![Command::Start(url("a.dmg"))]);
}

#[test]
fn tapping_a_succeeded_row_does_nothing() {
    let registry = FakeRegistry::with_tasks(&[("a.dmg", TaskStatus::Succeeded, 100, 100)]);
    let mut controller = controller(&registry);

    assert_eq!(controller.tap_row(0), Ok(None));
    assert!(registry.commands().is_empty());
}

#[test]
fn tapping_past_the_end_is_reported() {
    let registry = FakeRegistry::with_tasks(&[("a.dmg", TaskStatus::Running, 0, 100)]);
    let mut controller = controller(&registry);

    assert_eq!(
        controller.tap_row(3),
        Err(ControlError::RowOutOfRange { index: 3, len: 1 })
    );
    assert!(registry.commands().is_empty());
}

#[test]
fn tapping_a_vanished_task_is_a_lookup_miss() {
    let registry = FakeRegistry::with_tasks(&[("a.dmg", TaskStatus::Running, 0, 100)]);
    let mut controller = controller(&registry);
    registry.drop_task(&url("a.dmg"));

    assert_eq!(
        controller.tap_row(0),
        Err(ControlError::LookupMiss(url("a.dmg")))
    );
    assert!(registry.commands().is_empty());
}

#[test]
fn remove_keeps_row_until_registry_confirms() {
    let registry = FakeRegistry::with_tasks(&[
        ("a.dmg", TaskStatus::Running, 10, 100),
        ("b.dmg", TaskStatus::Running, 10, 100),
    ]);
    let mut controller = controller(&registry);
    let a = url("a.dmg");
    controller.row_will_display(SlotId(0), 0).unwrap();

    controller.remove_row(0, false).unwrap();
    controller.drain_deliveries();

    assert_eq!(registry.commands(), vec![Command::Remove(a.clone(), false)]);
    assert!(controller.sequence().contains(&a));
    assert!(controller.is_removal_pending(&a));
    let row = &controller.surface().rows[&SlotId(0)];
    assert_eq!(row.status_icon, StatusIcon::RemovalPending);

    // 任务已不在注册表里，但确认回调还没到
    registry.drop_task(&a);
    controller.row_will_display(SlotId(1), 0).unwrap_err();
    assert_eq!(
        controller.surface().rows[&SlotId(1)].status_icon,
        StatusIcon::RemovalPending
    );

    registry.emit(&a, TaskEventKind::Failure(TaskStatus::Removed));
    controller.drain_deliveries();

    assert_eq!(controller.sequence(), &[url("b.dmg")]);
    assert!(!controller.is_removal_pending(&a));
    assert_eq!(controller.surface().reloads.last(), Some(&1));
}

#[test]
fn pending_removal_row_ignores_taps() {
    let registry = FakeRegistry::with_tasks(&[("a.dmg", TaskStatus::Running, 10, 100)]);
    let mut controller = controller(&registry);
    controller.remove_row(0, true).unwrap();

    assert_eq!(
        controller.tap_row(0),
        Err(ControlError::RemovalPending(url("a.dmg")))
    );
    assert_eq!(
        registry.commands(),
        vec![Command::Remove(url("a.dmg"), true)]
    );
}

#[test]
fn failure_refreshes_rows_without_reordering() {
    let registry = FakeRegistry::with_tasks(&[
        ("a.dmg", TaskStatus::Running, 10, 100),
        ("b.dmg", TaskStatus::Running, 10, 100),
        ("c.dmg", TaskStatus::Running, 10, 100),
    ]);
    let mut controller = controller(&registry);
    controller.row_will_display(SlotId(0), 0).unwrap();
    controller.row_will_display(SlotId(1), 1).unwrap();
    let before = controller.sequence().to_vec();

    registry.set_status(&url("b.dmg"), TaskStatus::Failed);
    registry.emit(&url("b.dmg"), TaskEventKind::Failure(TaskStatus::Failed));
    controller.drain_deliveries();

    assert_eq!(controller.sequence(), before.as_slice());
    let surface = controller.surface();
    assert_eq!(surface.rows[&SlotId(0)].id, url("a.dmg"));
    assert_eq!(surface.rows[&SlotId(0)].status, TaskStatus::Running);
    assert_eq!(surface.rows[&SlotId(1)].id, url("b.dmg"));
    assert_eq!(surface.rows[&SlotId(1)].status, TaskStatus::Failed);
    assert_eq!(surface.reloads, vec![3]);
}

#[test]
fn externally_created_task_is_appended_once() {
    let registry = FakeRegistry::with_tasks(&[("a.dmg", TaskStatus::Running, 0, 100)]);
    let mut controller = controller(&registry);
    let b = registry.insert("b.dmg", TaskStatus::Waiting, 0, 100);

    registry.emit(&b, TaskEventKind::Created);
    registry.emit(&b, TaskEventKind::Created);
    controller.drain_deliveries();

    assert_eq!(controller.sequence(), &[url("a.dmg"), b]);
    assert_eq!(controller.surface().reloads, vec![1, 2]);
}

#[test]
fn aggregate_is_recomputed_from_the_sequence() {
    let registry = FakeRegistry::with_tasks(&[
        ("t1", TaskStatus::Running, 50, 100),
        ("t2", TaskStatus::Running, 25, 100),
    ]);
    let mut controller = controller(&registry);
    let view = controller.surface().aggregate.clone().unwrap();
    assert_eq!(view.fraction, 0.375);
    assert_eq!(view.total_percent_text, "Total progress: 37%");

    registry.set_progress(&url("t2"), 100);
    registry.emit(&url("t2"), TaskEventKind::Progress);
    controller.drain_deliveries();

    let view = controller.surface().aggregate.clone().unwrap();
    assert_eq!(view.fraction, 0.75);
}

#[test]
fn remove_all_marks_only_affected_rows_pending() {
    let registry = FakeRegistry::with_tasks(&[
        ("a.dmg", TaskStatus::Running, 0, 100),
        ("b.dmg", TaskStatus::Succeeded, 100, 100),
        ("c.dmg", TaskStatus::Removed, 0, 100),
    ]);
    let mut controller = controller(&registry);

    controller.tap_aggregate(AggregateAction::RemoveAll { completely: false });

    assert_eq!(registry.commands(), vec![Command::TotalRemove(false)]);
    assert!(controller.is_removal_pending(&url("a.dmg")));
    assert!(controller.is_removal_pending(&url("b.dmg")));
    assert!(!controller.is_removal_pending(&url("c.dmg")));
    assert_eq!(controller.sequence().len(), 3);
}

#[test]
fn aggregate_controls_issue_one_total_command_each() {
    let registry = FakeRegistry::with_tasks(&[("a.dmg", TaskStatus::Running, 0, 100)]);
    let mut controller = controller(&registry);

    controller.tap_aggregate(AggregateAction::StartAll);
    controller.tap_aggregate(AggregateAction::SuspendAll);
    controller.tap_aggregate(AggregateAction::CancelAll);

    assert_eq!(
        registry.commands(),
        vec![Command::TotalStart, Command::TotalSuspend, Command::TotalCancel]
    );
}

#[test]
fn cancel_row_issues_cancel() {
    let registry = FakeRegistry::with_tasks(&[("a.dmg", TaskStatus::Running, 0, 100)]);
    let mut controller = controller(&registry);

    controller.cancel_row(0).unwrap();

    assert_eq!(registry.commands(), vec![Command::Cancel(url("a.dmg"))]);
}

#[test]
fn config_switches_round_trip_through_registry() {
    let registry = FakeRegistry::with_tasks(&[]);
    let mut controller = controller(&registry);

    let switches = controller.change_config(ConfigChange::TaskLimit(true));
    assert!(switches.task_limit);
    let switches = controller.change_config(ConfigChange::CellularAccess(true));
    assert!(switches.cellular_access);
    let switches = controller.change_config(ConfigChange::TaskLimit(false));
    assert!(!switches.task_limit);

    assert_eq!(
        registry.commands(),
        vec![
            Command::MaxConcurrent(2),
            Command::Cellular(true),
            Command::MaxConcurrent(usize::MAX),
        ]
    );
    assert_eq!(controller.surface().switches, Some(switches));
}

#[test]
fn clear_disk_cache_goes_to_registry() {
    let registry = FakeRegistry::with_tasks(&[]);
    let mut controller = controller(&registry);

    controller.clear_disk_cache();

    assert_eq!(registry.commands(), vec![Command::ClearDiskCache]);
}
