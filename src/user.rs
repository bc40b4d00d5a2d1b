use crate::orm::{roles, users};
use crate::permission::Role;
use crate::session::{hash_password, verify_password};
use sea_orm::{entity::*, query::*, ConnectionTrait, DbErr};

/// A signed-in account with its role resolved.
#[derive(Clone, Debug)]
pub struct Profile {
    pub id: i32,
    pub username: String,
    pub last_name: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub role: Role,
}

impl Profile {
    fn from_models(user: users::Model, role: roles::Model) -> Option<Self> {
        let role = match Role::from_name(&role.name) {
            Some(role) => role,
            None => {
                log::error!("user {} has unknown role {:?}", user.id, role.name);
                return None;
            }
        };
        Some(Self {
            id: user.id,
            username: user.username,
            last_name: user.last_name,
            first_name: user.first_name,
            middle_name: user.middle_name,
            role,
        })
    }

    /// Returns a fully qualified user profile by id.
    pub async fn get_by_id<C>(db: &C, id: i32) -> Result<Option<Self>, DbErr>
    where
        C: ConnectionTrait,
    {
        let row = users::Entity::find_by_id(id)
            .find_also_related(roles::Entity)
            .one(db)
            .await?;

        Ok(match row {
            Some((user, Some(role))) => Self::from_models(user, role),
            _ => None,
        })
    }

    /// "Last First Middle", without a trailing space when there is no middle name.
    pub fn full_name(&self) -> String {
        format!(
            "{} {} {}",
            self.last_name,
            self.first_name,
            self.middle_name.as_deref().unwrap_or("")
        )
        .trim()
        .to_owned()
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }
}

#[derive(Debug)]
pub enum LoginResultStatus {
    Success(Profile),
    BadName,
    BadPassword,
}

/// Checks a username and password pair.
pub async fn login<C>(db: &C, name: &str, pass: &str) -> Result<LoginResultStatus, DbErr>
where
    C: ConnectionTrait,
{
    let user = users::Entity::find()
        .filter(users::Column::Username.eq(name))
        .one(db)
        .await?;

    let user = match user {
        Some(user) => user,
        None => return Ok(LoginResultStatus::BadName),
    };

    if !verify_password(pass, &user.password_hash) {
        return Ok(LoginResultStatus::BadPassword);
    }

    match Profile::get_by_id(db, user.id).await? {
        Some(profile) => Ok(LoginResultStatus::Success(profile)),
        None => Ok(LoginResultStatus::BadName),
    }
}

/// Fields for a new account.
pub struct NewUser<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub last_name: &'a str,
    pub first_name: &'a str,
    pub middle_name: Option<&'a str>,
    pub role: Role,
}

/// Inserts an account, hashing its password. The role row must already exist.
pub async fn insert_new_user<C>(db: &C, new: NewUser<'_>) -> Result<users::Model, DbErr>
where
    C: ConnectionTrait,
{
    let role = roles::Entity::find()
        .filter(roles::Column::Name.eq(new.role.name()))
        .one(db)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("role {}", new.role)))?;

    let password_hash = hash_password(new.password)
        .map_err(|e| DbErr::Custom(format!("Password hashing failed: {}", e)))?;

    users::ActiveModel {
        username: Set(new.username.to_owned()),
        password_hash: Set(password_hash),
        last_name: Set(new.last_name.to_owned()),
        first_name: Set(new.first_name.to_owned()),
        middle_name: Set(new.middle_name.map(str::to_owned)),
        role_id: Set(role.id),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Looks up a username, returning its id.
pub async fn get_user_id_from_name<C>(db: &C, name: &str) -> Result<Option<i32>, DbErr>
where
    C: ConnectionTrait,
{
    Ok(users::Entity::find()
        .filter(users::Column::Username.eq(name))
        .one(db)
        .await?
        .map(|user| user.id))
}
