//! First-run demo data.
//!
//! Runs exactly once: only when the users table is empty. The check and the
//! inserts share one transaction.

use tracing::info;

use br_core::constants::roles;
use br_core::error::BrResult;
use br_models::{
    now_millis, Database, Incident, IncidentDetails, Message, Photo, RecipientCopy, User,
};

use crate::password::PasswordHasher;

struct DemoUser {
    run: &'static str,
    dv: &'static str,
    username: &'static str,
    name: &'static str,
    email: &'static str,
    phone: &'static str,
    password: &'static str,
    rol_id: i64,
    photo: &'static str,
}

// Insertion order fixes the ids: the administrator is 1, support is 2.
const DEMO_USERS: [DemoUser; 4] = [
    DemoUser {
        run: "11111111",
        dv: "1",
        username: "admin",
        name: "Administrador",
        email: "a@a.cl",
        phone: "911111111",
        password: "Admin123!",
        rol_id: roles::ADMINISTRATOR,
        photo: "https://brigada.app/static/avatars/admin.png",
    },
    DemoUser {
        run: "22222222",
        dv: "2",
        username: "soporte",
        name: "Soporte",
        email: "soporte@brigada.cl",
        phone: "922222222",
        password: "Soporte123!",
        rol_id: roles::FIREFIGHTER,
        photo: "https://brigada.app/static/avatars/soporte.png",
    },
    DemoUser {
        run: "33333333",
        dv: "3",
        username: "bombero",
        name: "Bombero Demo",
        email: "b@b.cl",
        phone: "933333333",
        password: "Bombero123!",
        rol_id: roles::FIREFIGHTER,
        photo: "https://brigada.app/static/avatars/default.png",
    },
    DemoUser {
        run: "44444444",
        dv: "4",
        username: "ciudadano",
        name: "Ciudadano Demo",
        email: "c@c.cl",
        phone: "944444444",
        password: "Ciudadano123!",
        rol_id: roles::CITIZEN,
        photo: "https://brigada.app/static/avatars/default.png",
    },
];

/// Insert demo photos, users, a welcome alert and a sample incident.
///
/// Returns false without writing anything when users already exist.
pub fn seed_demo_data(database: &Database, hasher: &PasswordHasher) -> BrResult<bool> {
    if database.read(User::count)? > 0 {
        return Ok(false);
    }

    // Hashing is slow; keep it out of the write transaction.
    let hashes = DEMO_USERS
        .iter()
        .map(|u| hasher.hash(u.password))
        .collect::<BrResult<Vec<_>>>()?;

    let seeded = database.write(|conn| {
        if User::count(conn)? > 0 {
            return Ok(false);
        }

        let mut photos: Vec<Photo> = DEMO_USERS
            .iter()
            .map(|demo| Photo::new(demo.photo.rsplit('/').next().unwrap_or(demo.photo), demo.photo))
            .collect();
        Photo::insert_all(conn, &mut photos)?;

        let mut users: Vec<User> = DEMO_USERS
            .iter()
            .zip(hashes)
            .zip(&photos)
            .map(|((demo, password), photo)| User {
                id: None,
                run: demo.run.to_string(),
                dv: demo.dv.to_string(),
                username: demo.username.to_string(),
                name: demo.name.to_string(),
                email: demo.email.to_string(),
                phone: demo.phone.to_string(),
                password,
                foto_id: photo.id.unwrap_or_default(),
                rol_id: demo.rol_id,
            })
            .collect();
        User::insert_all(conn, &mut users)?;
        let ids: Vec<i64> = users.iter().filter_map(|user| user.id).collect();

        let now = now_millis();
        let (title, body) = ("Bienvenido a Brigada", "Reporta incidentes y recibe alertas de tu comuna.");
        let template_id = Message::alert(title, body, ids[0], now).insert(conn)?;
        RecipientCopy::fan_out(conn, template_id, title, body, now)?;

        let incident_photo = Photo::new("incendio.jpg", "https://brigada.app/static/incidents/incendio.jpg")
            .find_or_insert(conn)?;
        let details = IncidentDetails {
            title: "Humo en cerro San Cristobal".into(),
            detail: "Se observa una columna de humo cerca del funicular.".into(),
            foto_id: Some(incident_photo),
            latitude: Some(-33.4254),
            longitude: Some(-70.6336),
            comuna: Some("Providencia".into()),
            region: Some("Metropolitana".into()),
            address: Some("Pio Nono 450".into()),
        };
        Incident::new(details, Some(ids[3]), now).insert(conn)?;
        Ok(true)
    })?;

    if seeded {
        info!("seeded {} demo users", DEMO_USERS.len());
    }
    Ok(seeded)
}
