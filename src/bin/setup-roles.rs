/// Create the default staff roles and, optionally, a bootstrap management account.
/// Safe to run repeatedly: existing roles and usernames are left untouched.
///
/// Usage: setup-roles [--admin-username NAME --admin-password PASS [--admin-email EMAIL]]

use anyhow::{bail, Context};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use carehome_api::{
    models::{
        staff::RoleFlags,
        user::{validate_password, UserRole},
    },
    services::auth::AuthService,
};

#[derive(Parser)]
#[command(name = "setup-roles", about = "Create default roles and a bootstrap management user")]
struct Args {
    /// Username of the management account to create
    #[arg(long, requires = "admin_password")]
    admin_username: Option<String>,
    /// Password for the management account
    #[arg(long, requires = "admin_username")]
    admin_password: Option<String>,
    #[arg(long, default_value = "")]
    admin_email: String,
}

fn default_roles() -> [(&'static str, &'static str, RoleFlags); 2] {
    [
        (
            "Management",
            "Full administrative access to all system features",
            RoleFlags { is_management: true, ..Default::default() }.normalised(),
        ),
        (
            "Care Staff",
            "Standard care staff with limited permissions",
            RoleFlags { can_manage_care_plans: true, can_manage_medications: true, ..Default::default() },
        ),
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    let args = Args::parse();
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL environment variable not set")?;
    let pool = PgPoolOptions::new().max_connections(2).connect(&database_url).await?;

    for (name, description, flags) in default_roles() {
        let created = sqlx::query(
            "INSERT INTO roles (name, description, is_management, can_manage_staff, can_view_reports,
                                can_manage_care_plans, can_manage_medications)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (name) DO NOTHING",
        )
        .bind(name)
        .bind(description)
        .bind(flags.is_management)
        .bind(flags.can_manage_staff)
        .bind(flags.can_view_reports)
        .bind(flags.can_manage_care_plans)
        .bind(flags.can_manage_medications)
        .execute(&pool)
        .await?
        .rows_affected()
            > 0;

        if created {
            tracing::info!("Created {name} role");
        } else {
            tracing::info!("{name} role already exists");
        }
    }

    if let (Some(username), Some(password)) = (args.admin_username, args.admin_password) {
        if let Err(msg) = validate_password(&password) {
            bail!(msg);
        }
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(username) = LOWER($1))")
                .bind(&username)
                .fetch_one(&pool)
                .await?;
        if exists {
            tracing::info!("User {username} already exists, skipping");
        } else {
            let mut tx = pool.begin().await?;
            let user = AuthService::create_user(
                &mut tx,
                &username,
                &args.admin_email,
                &password,
                "",
                "",
                UserRole::Management,
            )
            .await?;
            tx.commit().await?;
            tracing::info!(user_id = %user.id, "Created management user {username}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn management_role_carries_every_capability() {
        let [(_, _, management), (_, _, care)] = default_roles();
        assert!(management.is_management && management.can_manage_staff && management.can_view_reports);
        assert!(!care.is_management && !care.can_manage_staff && !care.can_view_reports);
        assert!(care.can_manage_care_plans && care.can_manage_medications);
    }
}
