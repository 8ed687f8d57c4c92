use std::collections::BTreeMap;

use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    constants::SHOPPING_LIST_HEADER,
    error::{bad_request, QueryError},
    schema::CartPart,
};

use potion::Error;
use sqlx::{Pool, Postgres};

/// Every ingredient amount of every recipe in the session owner's cart.
pub async fn list_cart_parts(
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Vec<CartPart>, Error> {
    session.authenticate(ActionType::ManageOwnCart)?;

    let rows: Vec<CartPart> = sqlx::query_as(
        "
        SELECT i.name, i.measurement_unit, a.amount::BIGINT AS amount
        FROM shopping_cart c
        INNER JOIN ingredient_amounts a ON a.recipe_id = c.recipe_id
        INNER JOIN ingredients i ON i.id = a.ingredient_id
        WHERE c.user_id = $1
    ",
    )
    .bind(session.user_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

/// Cart contents summed per (ingredient name, measurement unit).
#[derive(Debug, Default, PartialEq)]
pub struct ShoppingList {
    totals: BTreeMap<(String, String), i64>,
}

impl ShoppingList {
    pub fn from_parts(parts: Vec<CartPart>) -> Self {
        let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();
        for part in parts {
            *totals
                .entry((part.name, part.measurement_unit))
                .or_insert(0) += part.amount;
        }

        Self { totals }
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    pub fn lines(&self) -> Vec<String> {
        self.totals
            .iter()
            .map(|((name, unit), amount)| format!("{name} ({unit}) — {amount}"))
            .collect()
    }

    pub fn render(&self) -> String {
        let mut text = format!("{SHOPPING_LIST_HEADER}\n");
        for line in self.lines() {
            text.push_str(&line);
            text.push('\n');
        }
        text
    }

    pub fn filename(username: &str) -> String {
        format!("{username}_shopping_list.txt")
    }
}

/// Aggregated shopping list of the session owner. An empty cart is an error.
pub async fn download_shopping_list(
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<String, Error> {
    let list = ShoppingList::from_parts(list_cart_parts(session, pool).await?);
    if list.is_empty() {
        return Err(bad_request("Shopping cart is empty."));
    }

    log::debug!("{} downloaded {} list lines", session.username, list.totals.len());

    Ok(list.render())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use sqlx::PgPool;

    use super::*;
    use crate::{
        actions::{add_marker, fixtures, ShoppingCart},
        error::error_body,
    };

    fn part(name: &str, unit: &str, amount: i64) -> CartPart {
        CartPart {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            amount,
        }
    }

    #[test]
    fn sums_shared_ingredients_across_recipes() {
        let list = ShoppingList::from_parts(vec![
            part("salt", "g", 5),
            part("flour", "g", 200),
            part("salt", "g", 10),
        ]);

        assert_eq!(list.lines(), vec!["flour (g) — 200", "salt (g) — 15"]);
    }

    #[test]
    fn keeps_units_apart() {
        let list = ShoppingList::from_parts(vec![
            part("milk", "ml", 200),
            part("milk", "cup", 1),
            part("milk", "ml", 50),
        ]);

        assert_eq!(list.lines(), vec!["milk (cup) — 1", "milk (ml) — 250"]);
    }

    #[test]
    fn renders_header_and_lines() {
        let list = ShoppingList::from_parts(vec![part("egg", "pcs", 3)]);

        assert_eq!(list.render(), "Shopping list\negg (pcs) — 3\n");
        assert_eq!(ShoppingList::filename("cook"), "cook_shopping_list.txt");
    }

    #[test]
    fn empty_cart_is_empty_list() {
        let list = ShoppingList::from_parts(vec![]);
        assert!(list.is_empty());
        assert!(list.lines().is_empty());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn cart_recipes_are_summed(pool: PgPool) {
        let cook = fixtures::member(&pool, "cook").await;
        let baker = fixtures::member(&pool, "baker").await;
        let salt = fixtures::ingredient(&pool, "salt", "g").await;
        let flour = fixtures::ingredient(&pool, "flour", "g").await;
        let milk = fixtures::ingredient(&pool, "milk", "ml").await;

        let soup = fixtures::recipe(&pool, &baker, "soup", &[(salt, 5), (milk, 200)]).await;
        let bread = fixtures::recipe(&pool, &baker, "bread", &[(salt, 10), (flour, 500)]).await;
        fixtures::recipe(&pool, &baker, "cake", &[(flour, 300)]).await;

        add_marker::<ShoppingCart>(&cook, soup, &pool).await.ok().unwrap();
        add_marker::<ShoppingCart>(&cook, bread, &pool).await.ok().unwrap();

        let parts = list_cart_parts(&cook, &pool).await.ok().unwrap();
        assert_eq!(parts.len(), 4);

        let text = download_shopping_list(&cook, &pool).await.ok().unwrap();
        assert_eq!(
            text,
            "Shopping list\nflour (g) — 500\nmilk (ml) — 200\nsalt (g) — 15\n"
        );
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn empty_cart_cannot_be_downloaded(pool: PgPool) {
        let cook = fixtures::member(&pool, "cook").await;

        let error = download_shopping_list(&cook, &pool).await.err().unwrap();
        assert_eq!(
            error_body(&error),
            (400, json!({ "errors": "Shopping cart is empty." }))
        );
    }
}
