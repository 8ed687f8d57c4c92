use sqlx::{Postgres, QueryBuilder};

use super::{error::ValidationError, schema::Uuid};

fn parse_bool(field: &'static str, value: &str) -> Result<bool, ValidationError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ValidationError::new(
            field,
            format!("Expected 0 or 1, got \"{value}\"."),
        )),
    }
}

/// Narrowing applied to the recipe listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeFilter {
    /// Tag slugs, matched with "any of".
    pub tags: Vec<String>,
    pub author: Option<Uuid>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

impl RecipeFilter {
    pub fn from_query(query: &[(String, String)]) -> Result<Self, ValidationError> {
        let mut filter = Self::default();

        for (key, value) in query {
            match key.as_str() {
                "tags" => {
                    let slug = value.trim();
                    if !slug.is_empty() && !filter.tags.iter().any(|t| t == slug) {
                        filter.tags.push(slug.to_string());
                    }
                }
                "author" => {
                    let author = value.trim().parse().map_err(|_| {
                        ValidationError::new(
                            "author",
                            format!("Expected a user id, got \"{value}\"."),
                        )
                    })?;
                    filter.author = Some(author);
                }
                "is_favorited" => filter.is_favorited = parse_bool("is_favorited", value)?,
                "is_in_shopping_cart" => {
                    filter.is_in_shopping_cart = parse_bool("is_in_shopping_cart", value)?
                }
                _ => {}
            }
        }

        Ok(filter)
    }

    /// True when the filter can only match the requester's own rows, which an
    /// anonymous requester has none of.
    pub fn needs_user(&self) -> bool {
        self.is_favorited || self.is_in_shopping_cart
    }

    /// Appends `AND ...` clauses for a query whose recipe alias is `r`.
    pub fn push_conditions(&self, builder: &mut QueryBuilder<'_, Postgres>, user_id: Option<Uuid>) {
        if !self.tags.is_empty() {
            builder
                .push(" AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id WHERE rt.recipe_id = r.id AND t.slug = ANY(")
                .push_bind(self.tags.clone())
                .push("))");
        }

        if let Some(author) = self.author {
            builder.push(" AND r.author_id = ").push_bind(author);
        }

        if self.is_favorited {
            builder
                .push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
                .push_bind(user_id)
                .push(")");
        }

        if self.is_in_shopping_cart {
            builder
                .push(" AND EXISTS (SELECT 1 FROM shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = ")
                .push_bind(user_id)
                .push(")");
        }
    }
}

/// Escapes `LIKE` wildcards so a search term matches literally.
pub fn like_pattern(search: &str) -> String {
    let escaped = search
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Narrowing applied to the ingredient listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngredientFilter {
    pub name: Option<String>,
}

impl IngredientFilter {
    pub fn from_query(query: &[(String, String)]) -> Self {
        let name = query
            .iter()
            .rev()
            .find(|(k, _)| k == "name")
            .map(|(_, v)| v.trim().to_string())
            .filter(|v| !v.is_empty());

        Self { name }
    }

    pub fn cache_key(&self) -> String {
        format!("search-{}", self.name.as_deref().unwrap_or("").to_lowercase())
    }
}

/// `recipes_limit` on the subscription endpoints.
pub fn recipes_limit(query: &[(String, String)]) -> Result<Option<i64>, String> {
    match query.iter().rev().find(|(k, _)| k == "recipes_limit") {
        None => Ok(None),
        Some((_, value)) => match value.trim().parse::<i64>() {
            Ok(limit) if limit >= 0 => Ok(Some(limit)),
            _ => Err(format!("recipes_limit must be a non-negative integer, got \"{value}\"")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn collects_distinct_tags() {
        let filter = RecipeFilter::from_query(&query(&[
            ("tags", "breakfast"),
            ("tags", "lunch"),
            ("tags", "breakfast"),
            ("tags", ""),
        ]))
        .unwrap();

        assert_eq!(filter.tags, vec!["breakfast", "lunch"]);
    }

    #[test]
    fn parses_author_and_flags() {
        let filter = RecipeFilter::from_query(&query(&[
            ("author", "12"),
            ("is_favorited", "1"),
            ("is_in_shopping_cart", "false"),
            ("page", "2"),
        ]))
        .unwrap();

        assert_eq!(filter.author, Some(12));
        assert!(filter.is_favorited);
        assert!(!filter.is_in_shopping_cart);
        assert!(filter.needs_user());
    }

    #[test]
    fn rejects_garbage() {
        let error = RecipeFilter::from_query(&query(&[("author", "12"), ("author", "bob")]))
            .unwrap_err();
        assert_eq!(error.field, "author");

        let error = RecipeFilter::from_query(&query(&[("is_favorited", "maybe")])).unwrap_err();
        assert_eq!(error.field, "is_favorited");

        let filter = RecipeFilter::from_query(&[]).unwrap();
        assert_eq!(filter, RecipeFilter::default());
        assert!(!filter.needs_user());
    }

    #[test]
    fn builds_sql_conditions() {
        let filter = RecipeFilter::from_query(&query(&[
            ("tags", "dinner"),
            ("author", "3"),
            ("is_in_shopping_cart", "1"),
        ]))
        .unwrap();

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT r.id FROM recipes r WHERE TRUE");
        filter.push_conditions(&mut builder, Some(9));
        let sql = builder.sql();

        assert!(sql.contains("t.slug = ANY($1)"));
        assert!(sql.contains("r.author_id = $2"));
        assert!(sql.contains("c.user_id = $3"));
        assert!(!sql.contains("favorites"));
    }

    #[test]
    fn escapes_like_wildcards() {
        assert_eq!(like_pattern(" sal "), "%sal%");
        assert_eq!(like_pattern("50%_"), "%50\\%\\_%");
    }

    #[test]
    fn ingredient_search_uses_last_name() {
        let filter = IngredientFilter::from_query(&query(&[("name", "a"), ("name", " Sug ")]));
        assert_eq!(filter.name.as_deref(), Some("Sug"));
        assert_eq!(filter.cache_key(), "search-sug");

        assert_eq!(IngredientFilter::from_query(&[]).name, None);
    }

    #[test]
    fn parses_recipes_limit() {
        assert_eq!(recipes_limit(&[]), Ok(None));
        assert_eq!(recipes_limit(&query(&[("recipes_limit", "3")])), Ok(Some(3)));
        assert!(recipes_limit(&query(&[("recipes_limit", "three")])).is_err());
        assert!(recipes_limit(&query(&[("recipes_limit", "-1")])).is_err());
    }
}
