use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type Uuid = i32;

#[derive(
    Clone, Debug, PartialEq, PartialOrd, sqlx::Type, Serialize, Eq, Ord, Hash, Deserialize,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub role: UserRole,
}

/// User as seen by the requester.
#[derive(sqlx::FromRow, Debug, Clone, Serialize, PartialEq)]
pub struct UserRow {
    pub email: String,
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct UserPageRow {
    pub email: String,
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,

    #[serde(skip)]
    pub count: i64,
}

impl From<UserPageRow> for UserRow {
    fn from(row: UserPageRow) -> Self {
        Self {
            email: row.email,
            id: row.id,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            is_subscribed: row.is_subscribed,
        }
    }
}

/// Followed author together with a (possibly truncated) list of their recipes.
#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    #[serde(flatten)]
    pub author: UserRow,
    pub recipes: Vec<ShortRecipe>,
    pub recipes_count: i64,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ingredient {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Recipe {
    pub id: Uuid,
    pub author_id: Uuid,
    pub name: String,
    pub text: String,
    pub image: String,
    pub cooking_time: i32,
    pub pub_date: DateTime<Utc>,
}

/// Recipe row joined with its author and the requester-relative flags.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeRow {
    pub id: Uuid,
    pub name: String,
    pub text: String,
    pub image: String,
    pub cooking_time: i32,
    pub pub_date: DateTime<Utc>,

    pub author_id: Uuid,
    pub author_email: String,
    pub author_username: String,
    pub author_first_name: String,
    pub author_last_name: String,
    pub author_is_subscribed: bool,

    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,

    pub count: i64,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct LinkedRecipeTag {
    pub recipe_id: Uuid,
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub slug: String,
}

impl From<LinkedRecipeTag> for Tag {
    fn from(value: LinkedRecipeTag) -> Self {
        Self {
            id: value.id,
            name: value.name,
            color: value.color,
            slug: value.slug,
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipePart {
    pub recipe_id: Uuid,
    pub ingredient_id: Uuid,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecipePartNoId {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

impl From<RecipePart> for RecipePartNoId {
    fn from(value: RecipePart) -> Self {
        Self {
            id: value.ingredient_id,
            name: value.name,
            measurement_unit: value.measurement_unit,
            amount: value.amount,
        }
    }
}

/// Full read representation of a recipe.
#[derive(Debug, Clone, Serialize)]
pub struct RecipeView {
    pub id: Uuid,
    pub tags: Vec<Tag>,
    pub author: UserRow,
    pub ingredients: Vec<RecipePartNoId>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, PartialEq)]
pub struct ShortRecipe {
    pub id: Uuid,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

/// One ingredient amount of a recipe sitting in somebody's shopping cart.
#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct CartPart {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_flattens_author() {
        let subscription = Subscription {
            author: UserRow {
                email: String::from("cook@example.com"),
                id: 3,
                username: String::from("cook"),
                first_name: String::from("Ann"),
                last_name: String::from("Lee"),
                is_subscribed: true,
            },
            recipes: vec![],
            recipes_count: 0,
        };

        let value = serde_json::to_value(&subscription).unwrap();
        assert_eq!(value["username"], "cook");
        assert_eq!(value["is_subscribed"], true);
        assert_eq!(value["recipes_count"], 0);
    }

    #[test]
    fn password_is_never_serialized() {
        let user = User {
            id: 1,
            email: String::from("a@b.c"),
            username: String::from("a"),
            first_name: String::from("A"),
            last_name: String::from("B"),
            password: String::from("$argon2id$..."),
            role: UserRole::User,
        };

        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("password").is_none());
        assert_eq!(value["role"], "user");
    }
}
