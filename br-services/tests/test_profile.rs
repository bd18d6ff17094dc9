//! Integration tests for profile reads and edits.

mod common;

use br_core::error::BrError;
use br_models::UserUpdate;

fn update(name: &str) -> UserUpdate {
    UserUpdate {
        name: name.into(),
        username: "ciudadana".into(),
        phone: "955555555".into(),
        run: "10000013".into(),
        dv: "k".into(),
    }
}

#[test]
fn profile_joins_role_and_photo() {
    let (ctx, _dir) = common::seeded_context();
    let profile = ctx.profiles.profile(common::FIREFIGHTER_ID).unwrap();

    assert_eq!(profile.username, "bombero");
    assert_eq!(profile.role_name, "Firefighter");
    assert!(profile.photo_url.starts_with("https://"));
}

#[test]
fn unknown_profile_is_not_found() {
    let (ctx, _dir) = common::seeded_context();
    assert!(matches!(ctx.profiles.profile(999).unwrap_err(), BrError::NotFound { .. }));
}

#[test]
fn update_persists_fields_and_refreshes_session() {
    let (ctx, _dir) = common::seeded_context();
    ctx.auth.login("c@c.cl", "Ciudadano123!").unwrap();

    let profile = ctx
        .profiles
        .update_user(common::CITIZEN_ID, &update("Ciudadana Editada"))
        .unwrap();

    assert_eq!(profile.name, "Ciudadana Editada");
    assert_eq!(profile.dv, "K");
    assert_eq!(profile.email, "c@c.cl");
    assert_eq!(ctx.session.current().unwrap().name, "Ciudadana Editada");
}

#[test]
fn invalid_update_changes_nothing() {
    let (ctx, _dir) = common::seeded_context();
    let mut bad = update("Nombre Valido");
    bad.dv = "1".into();

    assert!(ctx.profiles.update_user(common::CITIZEN_ID, &bad).is_err());
    assert_eq!(ctx.profiles.profile(common::CITIZEN_ID).unwrap().name, "Ciudadano Demo");
}

#[test]
fn change_photo_keeps_picked_url() {
    let (ctx, dir) = common::seeded_context();
    let image = common::picked_image(&dir, "nueva.PNG", b"new avatar");

    let profile = ctx
        .profiles
        .change_photo(common::CITIZEN_ID, image.to_str().unwrap())
        .unwrap();

    assert_eq!(profile.photo_url, br_services::photo_store::file_uri(&image));
    assert_eq!(profile.photo_name, "nueva.PNG");
    // The shared seed photo is still used by the firefighter account.
    assert!(ctx.profiles.profile(common::FIREFIGHTER_ID).unwrap().photo_url.starts_with("https://"));
}

#[test]
fn change_photo_to_content_uri_round_trips() {
    let (ctx, _dir) = common::seeded_context();
    let url = "content://media/external/images/media/42";

    let profile = ctx.profiles.change_photo(common::CITIZEN_ID, url).unwrap();
    assert_eq!(profile.photo_url, url);

    // Picking it again reuses the same row.
    let again = ctx.profiles.change_photo(common::FIREFIGHTER_ID, url).unwrap();
    assert_eq!(again.foto_id, profile.foto_id);
}
