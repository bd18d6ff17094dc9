//! Integration tests for alert broadcast and notification state.

mod common;

use br_core::error::ErrorKind;
use br_models::{RecipientCopy, User};
use br_services::{AppEvent, Registration};

fn copies_of(ctx: &br_services::AppContext, template_id: i64) -> i64 {
    ctx.database
        .read(|conn| RecipientCopy::count_for_template(conn, template_id))
        .unwrap()
}

#[test]
fn broadcast_reaches_every_existing_user() {
    let (ctx, _dir) = common::seeded_context();
    let mut events = ctx.event_bus.subscribe();
    let users = ctx.database.read(User::count).unwrap();

    let receipt = ctx
        .alerts
        .broadcast_alert(common::ADMIN_ID, "Corte de agua", "Manana entre 9 y 12")
        .unwrap();

    assert_eq!(receipt.recipients as i64, users);
    assert_eq!(copies_of(&ctx, receipt.template_id), users);
    assert!(matches!(
        events.try_recv().unwrap(),
        AppEvent::AlertBroadcast { recipients, .. } if recipients as i64 == users
    ));
}

#[test]
fn users_created_later_get_no_copy() {
    let (ctx, _dir) = common::seeded_context();
    let receipt = ctx
        .alerts
        .broadcast_alert(common::ADMIN_ID, "Simulacro", "Simulacro general a las 10")
        .unwrap();

    let late = ctx
        .auth
        .register(&Registration {
            run: "12345678".into(),
            dv: "5".into(),
            username: "tardio".into(),
            name: "Usuario Tardio".into(),
            email: "tardio@correo.cl".into(),
            phone: "987654321".into(),
            password: "Tardio123!".into(),
            photo: "https://img.example/t.png".into(),
            rol_id: None,
        })
        .unwrap();

    assert_eq!(copies_of(&ctx, receipt.template_id), 4);
    let notifications = ctx.alerts.notifications(late.id.unwrap()).unwrap();
    assert!(notifications.iter().all(|n| n.template_id != Some(receipt.template_id)));
}

#[test]
fn broadcast_from_unknown_sender_writes_nothing() {
    let (ctx, _dir) = common::seeded_context();
    let before = ctx.alerts.templates().unwrap().len();

    let err = ctx.alerts.broadcast_alert(999, "Alerta", "Cuerpo").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(ctx.alerts.templates().unwrap().len(), before);
}

#[test]
fn empty_alert_is_rejected() {
    let (ctx, _dir) = common::seeded_context();
    let err = ctx.alerts.broadcast_alert(common::ADMIN_ID, "  ", "Cuerpo").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn mark_all_read_is_idempotent() {
    let (ctx, _dir) = common::seeded_context();
    ctx.alerts
        .broadcast_alert(common::ADMIN_ID, "Lluvias", "Precaucion en quebradas")
        .unwrap();

    let first = ctx.alerts.mark_all_read(common::CITIZEN_ID).unwrap();
    let second = ctx.alerts.mark_all_read(common::CITIZEN_ID).unwrap();

    // Welcome alert from the seed plus this one.
    assert_eq!(first, 2);
    assert_eq!(second, 0);
    let unread = ctx
        .database
        .read(|conn| br_models::queries::unread_notification_count(conn, common::CITIZEN_ID))
        .unwrap();
    assert_eq!(unread, 0);
}

#[test]
fn per_copy_state_is_independent() {
    let (ctx, _dir) = common::seeded_context();
    ctx.alerts
        .broadcast_alert(common::ADMIN_ID, "Ola de calor", "Hidratese")
        .unwrap();

    let mine = ctx.alerts.notifications(common::CITIZEN_ID).unwrap();
    let copy_id = mine[0].id.unwrap();
    ctx.alerts.mark_read(common::CITIZEN_ID, copy_id).unwrap();
    ctx.alerts.mark_read(common::CITIZEN_ID, copy_id).unwrap();
    ctx.alerts.mark_deleted(common::CITIZEN_ID, copy_id).unwrap();

    assert_eq!(ctx.alerts.notifications(common::CITIZEN_ID).unwrap().len(), mine.len() - 1);
    assert_eq!(ctx.alerts.notifications(common::FIREFIGHTER_ID).unwrap().len(), mine.len());
    assert_eq!(
        ctx.alerts.mark_read(common::CITIZEN_ID, 424242).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn copies_of_other_users_cannot_be_touched() {
    let (ctx, _dir) = common::seeded_context();
    ctx.alerts
        .broadcast_alert(common::ADMIN_ID, "Corte de agua", "Hasta las 18:00")
        .unwrap();
    let theirs = ctx.alerts.notifications(common::FIREFIGHTER_ID).unwrap()[0].clone();
    let copy_id = theirs.id.unwrap();

    let read = ctx.alerts.mark_read(common::CITIZEN_ID, copy_id).unwrap_err();
    let deleted = ctx.alerts.mark_deleted(common::CITIZEN_ID, copy_id).unwrap_err();
    assert_eq!(read.kind(), ErrorKind::NotFound);
    assert_eq!(deleted.kind(), ErrorKind::NotFound);

    let after = ctx.alerts.notifications(common::FIREFIGHTER_ID).unwrap();
    assert_eq!(after[0], theirs);
}

#[test]
fn withdraw_hides_every_copy_and_flags_template() {
    let (ctx, _dir) = common::seeded_context();
    let receipt = ctx
        .alerts
        .broadcast_alert(common::ADMIN_ID, "Error", "Enviado por error")
        .unwrap();

    let hidden = ctx.alerts.withdraw_alert(receipt.template_id).unwrap();
    assert_eq!(hidden, receipt.recipients);
    assert_eq!(ctx.alerts.withdraw_alert(receipt.template_id).unwrap(), 0);

    for user_id in [common::ADMIN_ID, common::CITIZEN_ID] {
        let visible = ctx.alerts.notifications(user_id).unwrap();
        assert!(visible.iter().all(|n| n.template_id != Some(receipt.template_id)));
    }
    let summary = ctx
        .alerts
        .templates()
        .unwrap()
        .into_iter()
        .find(|s| s.template.id == Some(receipt.template_id))
        .unwrap();
    assert!(summary.template.withdrawn);
}

#[test]
fn notice_goes_to_one_user_only() {
    let (ctx, _dir) = common::seeded_context();
    let before = ctx.alerts.notifications(common::ADMIN_ID).unwrap().len();

    let copy = ctx
        .alerts
        .notify_user(common::CITIZEN_ID, "Reporte recibido", "Gracias por avisar")
        .unwrap();

    assert_eq!(copy.template_id, None);
    assert_eq!(ctx.alerts.notifications(common::ADMIN_ID).unwrap().len(), before);
}

#[tokio::test]
async fn unread_count_updates_live() {
    let (ctx, _dir) = common::seeded_context();
    let mut unread = ctx.alerts.observe_unread_count(common::CITIZEN_ID);
    assert_eq!(unread.wait_until(|n| *n == 1).await, Some(1));

    let alerts = ctx.alerts.clone();
    tokio::task::spawn_blocking(move || alerts.broadcast_alert(common::ADMIN_ID, "Aviso", "Nuevo aviso"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unread.wait_until(|n| *n == 2).await, Some(2));

    let alerts = ctx.alerts.clone();
    tokio::task::spawn_blocking(move || alerts.mark_all_read(common::CITIZEN_ID))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unread.wait_until(|n| *n == 0).await, Some(0));
}

#[test]
fn mark_template_read_only_touches_that_alert() {
    let (ctx, _dir) = common::seeded_context();
    let receipt = ctx
        .alerts
        .broadcast_alert(common::ADMIN_ID, "Simulacro", "Simulacro de evacuacion a las 11")
        .unwrap();

    assert_eq!(ctx.alerts.mark_template_read(receipt.template_id).unwrap(), receipt.recipients);
    assert_eq!(ctx.alerts.mark_template_read(receipt.template_id).unwrap(), 0);

    let inbox = ctx.alerts.notifications(common::CITIZEN_ID).unwrap();
    let (drill, others): (Vec<_>, Vec<_>) = inbox
        .iter()
        .partition(|n| n.template_id == Some(receipt.template_id));
    assert!(drill.iter().all(|n| n.read));
    assert!(others.iter().any(|n| !n.read));

    let summary = ctx
        .alerts
        .templates()
        .unwrap()
        .into_iter()
        .find(|s| s.template.id == Some(receipt.template_id))
        .unwrap();
    assert_eq!(summary.read_count, summary.recipients);
    assert_eq!(ctx.alerts.mark_template_read(424242).unwrap_err().kind(), ErrorKind::NotFound);
}
