use sqlx::PgPool;

use crate::db::models::User;

const COLUMNS: &str = "id, email, name, is_admin, created_at";

pub(crate) async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE email = $1"))
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub(crate) struct UpsertUser<'a> {
    pub id: &'a str,
    pub email: &'a str,
    pub name: Option<&'a str>,
    pub is_admin: bool,
    pub created_at: time::PrimitiveDateTime,
}

/// Insert the user, or refresh the display name if the email is already
/// known. `is_admin` is set once at creation and never touched again, so
/// neither token sync nor assignment mirroring can flip an existing row.
pub(crate) async fn upsert(
    executor: impl sqlx::PgExecutor<'_>,
    params: UpsertUser<'_>,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (id, email, name, is_admin, created_at)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (email) DO UPDATE
         SET name = COALESCE(EXCLUDED.name, users.name)
         RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.email)
    .bind(params.name)
    .bind(params.is_admin)
    .bind(params.created_at)
    .fetch_one(executor)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::primitive_now_utc;
    use crate::test_support;

    #[tokio::test]
    async fn existing_admin_keeps_flag_through_assignment_mirror() {
        let _guard = test_support::env_lock().await;
        let Some(pool) = test_support::test_db().await else { return };

        let created = upsert(
            &pool,
            UpsertUser {
                id: "subject-1",
                email: "boss@nmkglobalinc.com",
                name: Some("Boss"),
                is_admin: true,
                created_at: primitive_now_utc(),
            },
        )
        .await
        .expect("insert admin");
        assert!(created.is_admin);

        // The assignment path mirrors every email with is_admin false; an
        // already-known admin must come back unchanged.
        let mirrored = upsert(
            &pool,
            UpsertUser {
                id: "boss@nmkglobalinc.com",
                email: "boss@nmkglobalinc.com",
                name: None,
                is_admin: false,
                created_at: primitive_now_utc(),
            },
        )
        .await
        .expect("mirror upsert");

        assert!(mirrored.is_admin);
        assert_eq!(mirrored.id, "subject-1");
        assert_eq!(mirrored.name.as_deref(), Some("Boss"));
    }
}
