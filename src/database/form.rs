use std::{collections::HashSet, sync::LazyLock};

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use super::{error::ValidationError, schema::Uuid};
use crate::constants::{
    EMAIL_MAX_CHARS, FORBIDDEN_USERNAMES, HEX_MAX_CHARS, MAX_AMOUNT, MAX_COOKING_TIME,
    MAX_RECIPE_INGREDIENTS, MAX_RECIPE_TAGS, MIN_AMOUNT, MIN_COOKING_TIME, PASSWORD_MIN_CHARS, RECIPES_MAX_CHARS, RECIPE_NAME_MAX_CHARS,
    TAG_SLUG_MAX_CHARS, USER_MAX_CHARS,
};

static USERNAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\w.@+-]+$").unwrap());
static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());
static HEX_COLOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#(?:[0-9a-fA-F]{2}){3,4}$").unwrap());
static SLUG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").unwrap());

/// Reads an integer sent either as a JSON number or as a numeric string.
pub fn get_number(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Collapses internal whitespace, trims and lowercases a recipe name.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
        .to_lowercase()
}

fn required(field: &'static str, value: Option<String>) -> Result<String, ValidationError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ValidationError::new(field, "This field is required.")),
    }
}

fn max_chars(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        return Err(ValidationError::new(
            field,
            format!("Ensure this field has no more than {max} characters."),
        ));
    }
    Ok(())
}

// Recipes

#[derive(Deserialize, Debug, Clone)]
pub struct IngredientAmountPayload {
    pub id: Value,
    pub amount: Value,
}

/// Recipe write shape as sent by clients.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct RecipePayload {
    #[serde(default)]
    pub tags: Vec<Value>,
    #[serde(default)]
    pub ingredients: Vec<IngredientAmountPayload>,
    pub name: Option<String>,
    pub text: Option<String>,
    pub image: Option<String>,
    pub cooking_time: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngredientAmountForm {
    pub ingredient_id: Uuid,
    pub amount: i32,
}

/// Validated recipe write. Scalar fields are `None` only for updates that
/// leave them untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeForm {
    pub name: Option<String>,
    pub text: Option<String>,
    pub image: Option<String>,
    pub cooking_time: Option<i32>,
    pub tags: Vec<Uuid>,
    pub ingredients: Vec<IngredientAmountForm>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WriteMode {
    Create,
    Update,
}

impl RecipePayload {
    pub fn validate(self, mode: WriteMode) -> Result<RecipeForm, ValidationError> {
        if self.tags.is_empty() {
            return Err(ValidationError::new("tags", "Add at least one tag."));
        }

        let mut tags: Vec<Uuid> = Vec::with_capacity(self.tags.len());
        for tag in self.tags.iter() {
            let id = get_number(tag)
                .and_then(|id| Uuid::try_from(id).ok())
                .ok_or_else(|| ValidationError::new("tags", format!("Invalid tag id {tag}.")))?;
            if !tags.contains(&id) {
                tags.push(id);
            }
        }
        if tags.len() > MAX_RECIPE_TAGS {
            return Err(ValidationError::new(
                "tags",
                format!("A recipe can have at most {MAX_RECIPE_TAGS} tags."),
            ));
        }

        if self.ingredients.is_empty() {
            return Err(ValidationError::new("ingredients", "Recipe needs ingredients."));
        }
        if self.ingredients.len() > MAX_RECIPE_INGREDIENTS {
            return Err(ValidationError::new(
                "ingredients",
                format!("A recipe can have at most {MAX_RECIPE_INGREDIENTS} ingredients."),
            ));
        }

        let mut seen: HashSet<Uuid> = HashSet::new();
        let mut ingredients: Vec<(Uuid, &Value)> = Vec::with_capacity(self.ingredients.len());
        for part in self.ingredients.iter() {
            let id = get_number(&part.id)
                .and_then(|id| Uuid::try_from(id).ok())
                .ok_or_else(|| {
                    ValidationError::new(
                        "ingredients",
                        format!("Invalid ingredient id {}.", part.id),
                    )
                })?;
            if !seen.insert(id) {
                return Err(ValidationError::new(
                    "ingredients",
                    format!("Ingredient {id} is listed more than once."),
                ));
            }
            ingredients.push((id, &part.amount));
        }

        let ingredients = ingredients
            .into_iter()
            .map(|(id, amount)| {
                get_number(amount)
                    .filter(|a| (MIN_AMOUNT..=MAX_AMOUNT).contains(a))
                    .map(|a| IngredientAmountForm {
                        ingredient_id: id,
                        amount: a as i32,
                    })
                    .ok_or_else(|| {
                        ValidationError::new(
                            "ingredients",
                            format!(
                                "Ingredient {id}: amount {amount} must be a whole number from {MIN_AMOUNT} to {MAX_AMOUNT}."
                            ),
                        )
                    })
            })
            .collect::<Result<Vec<IngredientAmountForm>, ValidationError>>()?;

        let cooking_time = match self.cooking_time {
            Some(value) => Some(
                get_number(&value)
                    .filter(|t| (MIN_COOKING_TIME..=MAX_COOKING_TIME).contains(t))
                    .map(|t| t as i32)
                    .ok_or_else(|| {
                        ValidationError::new(
                            "cooking_time",
                            format!(
                                "Cooking time must be from {MIN_COOKING_TIME} to {MAX_COOKING_TIME} minutes."
                            ),
                        )
                    })?,
            ),
            None if mode == WriteMode::Create => {
                return Err(ValidationError::new("cooking_time", "This field is required."))
            }
            None => None,
        };

        let name = match (self.name, mode) {
            (None, WriteMode::Update) => None,
            (name, _) => {
                let name = normalize_name(&required("name", name)?);
                max_chars("name", &name, RECIPE_NAME_MAX_CHARS)?;
                Some(name)
            }
        };

        let text = match (self.text, mode) {
            (None, WriteMode::Update) => None,
            (text, _) => Some(required("text", text)?),
        };

        let image = match (self.image, mode) {
            (None, WriteMode::Update) => None,
            (image, _) => Some(required("image", image)?),
        };

        Ok(RecipeForm {
            name,
            text,
            image,
            cooking_time,
            tags,
            ingredients,
        })
    }
}

// Users

#[derive(Deserialize, Debug, Clone, Default)]
pub struct UserPayload {
    pub email: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserForm {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

fn validate_person_name(field: &'static str, value: &str) -> Result<(), ValidationError> {
    max_chars(field, value, USER_MAX_CHARS)?;
    if !value
        .chars()
        .all(|c| c.is_alphabetic() || c == '-' || c == ' ')
    {
        return Err(ValidationError::new(field, "Only letters are allowed."));
    }
    Ok(())
}

pub fn validate_password(field: &'static str, password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < PASSWORD_MIN_CHARS {
        return Err(ValidationError::new(
            field,
            format!("This password is too short. It must contain at least {PASSWORD_MIN_CHARS} characters."),
        ));
    }
    Ok(())
}

impl UserPayload {
    pub fn validate(self) -> Result<UserForm, ValidationError> {
        let email = required("email", self.email)?.to_lowercase();
        max_chars("email", &email, EMAIL_MAX_CHARS)?;
        if !EMAIL.is_match(&email) {
            return Err(ValidationError::new("email", "Enter a valid email address."));
        }

        let username = required("username", self.username)?;
        max_chars("username", &username, USER_MAX_CHARS)?;
        if !USERNAME.is_match(&username) {
            return Err(ValidationError::new(
                "username",
                "Enter a valid username. It may contain only letters, numbers, and @/./+/-/_ characters.",
            ));
        }
        if FORBIDDEN_USERNAMES
            .iter()
            .any(|forbidden| forbidden.eq_ignore_ascii_case(&username))
        {
            return Err(ValidationError::new(
                "username",
                format!("Username \"{username}\" is not allowed."),
            ));
        }

        let first_name = required("first_name", self.first_name)?;
        validate_person_name("first_name", &first_name)?;

        let last_name = required("last_name", self.last_name)?;
        validate_person_name("last_name", &last_name)?;

        let password = self
            .password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ValidationError::new("password", "This field is required."))?;
        validate_password("password", &password)?;

        Ok(UserForm {
            email,
            username,
            first_name,
            last_name,
            password,
        })
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct SetPasswordPayload {
    pub new_password: String,
    pub current_password: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

// Tags & ingredients

#[derive(Deserialize, Debug, Clone, Default)]
pub struct TagPayload {
    pub name: Option<String>,
    pub color: Option<String>,
    pub slug: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TagForm {
    pub name: String,
    pub color: String,
    pub slug: String,
}

impl TagPayload {
    pub fn validate(self) -> Result<TagForm, ValidationError> {
        let name = required("name", self.name)?;
        max_chars("name", &name, RECIPES_MAX_CHARS)?;

        let color = required("color", self.color)?;
        max_chars("color", &color, HEX_MAX_CHARS)?;
        if !HEX_COLOR.is_match(&color) {
            return Err(ValidationError::new("color", "Enter a HEX color code."));
        }

        let slug = required("slug", self.slug)?;
        max_chars("slug", &slug, TAG_SLUG_MAX_CHARS)?;
        if !SLUG.is_match(&slug) {
            return Err(ValidationError::new(
                "slug",
                "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
            ));
        }

        Ok(TagForm { name, color, slug })
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct IngredientPayload {
    pub name: Option<String>,
    pub measurement_unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngredientForm {
    pub name: String,
    pub measurement_unit: String,
}

impl IngredientPayload {
    pub fn validate(self) -> Result<IngredientForm, ValidationError> {
        let name = required("name", self.name)?;
        max_chars("name", &name, RECIPES_MAX_CHARS)?;

        let measurement_unit = required("measurement_unit", self.measurement_unit)?;
        max_chars("measurement_unit", &measurement_unit, RECIPES_MAX_CHARS)?;

        Ok(IngredientForm {
            name,
            measurement_unit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> RecipePayload {
        serde_json::from_value(value).unwrap()
    }

    fn valid() -> Value {
        json!({
            "tags": [1, 2],
            "ingredients": [{"id": 1, "amount": 10}, {"id": 2, "amount": "5"}],
            "name": "  Borscht   With  Beans ",
            "text": "Boil everything.",
            "image": "data:image/png;base64,iVBORw0KGgo=",
            "cooking_time": 45
        })
    }

    fn field_of(value: Value, mode: WriteMode) -> &'static str {
        payload(value).validate(mode).unwrap_err().field
    }

    #[test]
    fn accepts_valid_recipe() {
        let form = payload(valid()).validate(WriteMode::Create).unwrap();

        assert_eq!(form.name.as_deref(), Some("borscht with beans"));
        assert_eq!(form.tags, vec![1, 2]);
        assert_eq!(form.cooking_time, Some(45));
        assert_eq!(
            form.ingredients,
            vec![
                IngredientAmountForm { ingredient_id: 1, amount: 10 },
                IngredientAmountForm { ingredient_id: 2, amount: 5 },
            ]
        );
    }

    #[test]
    fn rejects_empty_tags_first() {
        let mut value = valid();
        value["tags"] = json!([]);
        value["ingredients"] = json!([]);

        let error = payload(value).validate(WriteMode::Create).unwrap_err();
        assert_eq!(error.field, "tags");
        assert_eq!(error.message, "Add at least one tag.");
    }

    #[test]
    fn rejects_empty_ingredients() {
        let mut value = valid();
        value["ingredients"] = json!([]);

        let error = payload(value).validate(WriteMode::Update).unwrap_err();
        assert_eq!(error.field, "ingredients");
        assert_eq!(error.message, "Recipe needs ingredients.");
    }

    #[test]
    fn rejects_duplicate_ingredient() {
        let mut value = valid();
        value["ingredients"] = json!([{"id": 7, "amount": 1}, {"id": "7", "amount": 2}]);

        let error = payload(value).validate(WriteMode::Create).unwrap_err();
        assert_eq!(error.field, "ingredients");
        assert!(error.message.contains('7'));
    }

    #[test]
    fn rejects_amount_out_of_range() {
        for amount in [json!(0), json!(10_001), json!(-3), json!(2.5), json!("a lot")] {
            let mut value = valid();
            value["ingredients"] = json!([{"id": 4, "amount": amount}]);

            let error = payload(value).validate(WriteMode::Create).unwrap_err();
            assert_eq!(error.field, "ingredients");
            assert!(error.message.contains("Ingredient 4"));
        }

        let mut value = valid();
        value["ingredients"] = json!([{"id": 4, "amount": 10_000}, {"id": 5, "amount": 1}]);
        assert!(payload(value).validate(WriteMode::Create).is_ok());
    }

    #[test]
    fn duplicate_is_reported_before_amount() {
        let mut value = valid();
        value["ingredients"] = json!([{"id": 1, "amount": 0}, {"id": 1, "amount": 1}]);

        let error = payload(value).validate(WriteMode::Create).unwrap_err();
        assert!(error.message.contains("more than once"));
    }

    #[test]
    fn rejects_cooking_time_out_of_range() {
        for time in [json!(0), json!(301), json!("-1")] {
            let mut value = valid();
            value["cooking_time"] = time;
            assert_eq!(field_of(value, WriteMode::Create), "cooking_time");
        }

        let mut value = valid();
        value["cooking_time"] = json!("300");
        assert!(payload(value).validate(WriteMode::Create).is_ok());
    }

    #[test]
    fn create_requires_scalars_update_does_not() {
        let value = json!({
            "tags": [1],
            "ingredients": [{"id": 1, "amount": 1}]
        });

        assert_eq!(field_of(value.clone(), WriteMode::Create), "cooking_time");

        let form = payload(value).validate(WriteMode::Update).unwrap();
        assert_eq!(form.name, None);
        assert_eq!(form.image, None);
        assert_eq!(form.cooking_time, None);
    }

    #[test]
    fn blank_name_is_rejected() {
        let mut value = valid();
        value["name"] = json!("   ");
        assert_eq!(field_of(value, WriteMode::Update), "name");
    }

    #[test]
    fn duplicate_tags_are_collapsed() {
        let mut value = valid();
        value["tags"] = json!([3, "3", 1]);

        let form = payload(value).validate(WriteMode::Create).unwrap();
        assert_eq!(form.tags, vec![3, 1]);
    }

    #[test]
    fn rejects_oversized_lists() {
        let mut value = valid();
        value["tags"] = json!((1..=MAX_RECIPE_TAGS as i64 + 1).collect::<Vec<i64>>());
        let error = payload(value).validate(WriteMode::Create).unwrap_err();
        assert_eq!(error.field, "tags");
        assert!(error.message.contains("at most"));

        let mut value = valid();
        value["ingredients"] = json!((1..=MAX_RECIPE_INGREDIENTS as i64 + 1)
            .map(|id| json!({ "id": id, "amount": 1 }))
            .collect::<Vec<Value>>());
        let error = payload(value).validate(WriteMode::Create).unwrap_err();
        assert_eq!(error.field, "ingredients");
        assert!(error.message.contains("at most"));
    }

    #[test]
    fn normalizes_names() {
        assert_eq!(normalize_name("  Pasta \t Carbonara\n"), "pasta carbonara");
        assert_eq!(normalize_name("SOUP"), "soup");
    }

    fn user() -> Value {
        json!({
            "email": "Cook@Example.com",
            "username": "cook.42",
            "first_name": "Anna",
            "last_name": "Lee-Smith",
            "password": "correct horse"
        })
    }

    #[test]
    fn accepts_valid_user() {
        let form: UserForm = serde_json::from_value::<UserPayload>(user())
            .unwrap()
            .validate()
            .unwrap();

        assert_eq!(form.email, "cook@example.com");
        assert_eq!(form.username, "cook.42");
    }

    #[test]
    fn rejects_me_username() {
        for name in ["me", "ME", "Me"] {
            let mut value = user();
            value["username"] = json!(name);

            let error = serde_json::from_value::<UserPayload>(value)
                .unwrap()
                .validate()
                .unwrap_err();
            assert_eq!(error.field, "username");
        }
    }

    #[test]
    fn rejects_bad_user_fields() {
        let cases = [
            ("email", json!("not-an-email")),
            ("username", json!("with space")),
            ("first_name", json!("R2D2")),
            ("last_name", json!("")),
            ("password", json!("short")),
        ];

        for (field, bad) in cases {
            let mut value = user();
            value[field] = bad;

            let error = serde_json::from_value::<UserPayload>(value)
                .unwrap()
                .validate()
                .unwrap_err();
            assert_eq!(error.field, field);
        }
    }

    #[test]
    fn validates_tags() {
        let tag = TagPayload {
            name: Some(String::from("Breakfast")),
            color: Some(String::from("#E26C2D")),
            slug: Some(String::from("breakfast")),
        };
        assert!(tag.clone().validate().is_ok());

        let mut bad_color = tag.clone();
        bad_color.color = Some(String::from("orange"));
        assert_eq!(bad_color.validate().unwrap_err().field, "color");

        let mut bad_slug = tag;
        bad_slug.slug = Some(String::from("early morning"));
        assert_eq!(bad_slug.validate().unwrap_err().field, "slug");
    }

    #[test]
    fn validates_ingredients() {
        let ingredient = IngredientPayload {
            name: Some(String::from("salt")),
            measurement_unit: Some(String::from(" ")),
        };
        assert_eq!(
            ingredient.validate().unwrap_err().field,
            "measurement_unit"
        );
    }
}
