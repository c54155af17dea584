use anyhow::{anyhow, Result};
use log::debug;
use sqlx::{FromRow, PgPool};

use super::{auth::Claims, memory::Memory};

/// Handle to the persistence layer, passed explicitly to every accessor.
#[derive(Clone)]
pub enum Store {
    Postgres(PgPool),
    Memory(Memory),
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct List {
    pub id: i32,
    pub name: String,
    pub user_id: i32,
}

#[derive(Debug, Clone)]
pub struct NewList {
    pub name: String,
    pub user_id: i32,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Item {
    pub id: i32,
    pub item: String,
    pub todolist_id: i32,
}

#[derive(Debug, Clone)]
pub struct NewItem {
    pub item: String,
    pub todolist_id: i32,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct User {
    pub id: i32,
    pub subject: String,
    pub email: String,
    pub name: String,
}

pub(crate) fn list_not_found(id: i32) -> anyhow::Error {
    anyhow!("no list with id {}", id)
}

pub(crate) fn item_not_found(id: i32) -> anyhow::Error {
    anyhow!("no item with id {}", id)
}

impl List {
    pub async fn find_by_user(user_id: i32, store: &Store) -> Result<Vec<List>> {
        debug!("finding lists of user {}", user_id);
        match store {
            Store::Postgres(pool) => {
                let lists = sqlx::query_as::<_, List>(
                    "SELECT id, name, user_id FROM todolists WHERE user_id = $1 ORDER BY id",
                )
                .bind(user_id)
                .fetch_all(pool)
                .await?;

                Ok(lists)
            }
            Store::Memory(memory) => memory.lists_by_user(user_id),
        }
    }

    pub async fn create(list: NewList, store: &Store) -> Result<List> {
        debug!("creating list {:?}", list);
        match store {
            Store::Postgres(pool) => {
                let list = sqlx::query_as::<_, List>(
                    "INSERT INTO todolists (name, user_id) VALUES ($1, $2) RETURNING id, name, user_id",
                )
                .bind(list.name)
                .bind(list.user_id)
                .fetch_one(pool)
                .await?;

                Ok(list)
            }
            Store::Memory(memory) => memory.create_list(list),
        }
    }

    pub async fn update(list: NewList, id: i32, store: &Store) -> Result<List> {
        debug!("updating list {} to {:?}", id, list);
        match store {
            Store::Postgres(pool) => {
                let list = sqlx::query_as::<_, List>(
                    "UPDATE todolists SET name = $1, user_id = $2 WHERE id = $3 RETURNING id, name, user_id",
                )
                .bind(list.name)
                .bind(list.user_id)
                .bind(id)
                .fetch_optional(pool)
                .await?;

                list.ok_or_else(|| list_not_found(id))
            }
            Store::Memory(memory) => memory.update_list(list, id),
        }
    }

    /// Deletes the list together with its items and returns the deleted id.
    pub async fn delete(id: i32, store: &Store) -> Result<i32> {
        debug!("deleting list {}", id);
        match store {
            Store::Postgres(pool) => {
                let deleted: Option<(i32,)> =
                    sqlx::query_as("DELETE FROM todolists WHERE id = $1 RETURNING id")
                        .bind(id)
                        .fetch_optional(pool)
                        .await?;

                deleted.map(|(id,)| id).ok_or_else(|| list_not_found(id))
            }
            Store::Memory(memory) => memory.delete_list(id),
        }
    }
}

impl Item {
    pub async fn find_by_list(todolist_id: i32, store: &Store) -> Result<Vec<Item>> {
        debug!("finding items of list {}", todolist_id);
        match store {
            Store::Postgres(pool) => {
                let items = sqlx::query_as::<_, Item>(
                    "SELECT id, item, todolist_id FROM todolist_items WHERE todolist_id = $1 ORDER BY id",
                )
                .bind(todolist_id)
                .fetch_all(pool)
                .await?;

                Ok(items)
            }
            Store::Memory(memory) => memory.items_by_list(todolist_id),
        }
    }

    /// Inserts the item and returns every item of its list afterwards.
    pub async fn create(item: NewItem, store: &Store) -> Result<Vec<Item>> {
        debug!("creating item {:?}", item);
        let todolist_id = item.todolist_id;
        match store {
            Store::Postgres(pool) => {
                sqlx::query("INSERT INTO todolist_items (item, todolist_id) VALUES ($1, $2)")
                    .bind(item.item)
                    .bind(item.todolist_id)
                    .execute(pool)
                    .await?;
            }
            Store::Memory(memory) => {
                memory.create_item(item)?;
            }
        }

        Item::find_by_list(todolist_id, store).await
    }

    /// Updates the item and returns every item of the list it now belongs to.
    pub async fn update(item: NewItem, id: i32, store: &Store) -> Result<Vec<Item>> {
        debug!("updating item {} to {:?}", id, item);
        let todolist_id = item.todolist_id;
        match store {
            Store::Postgres(pool) => {
                let updated = sqlx::query(
                    "UPDATE todolist_items SET item = $1, todolist_id = $2 WHERE id = $3",
                )
                .bind(item.item)
                .bind(item.todolist_id)
                .bind(id)
                .execute(pool)
                .await?;

                if updated.rows_affected() == 0 {
                    return Err(item_not_found(id));
                }
            }
            Store::Memory(memory) => {
                memory.update_item(item, id)?;
            }
        }

        Item::find_by_list(todolist_id, store).await
    }

    pub async fn delete(id: i32, store: &Store) -> Result<i32> {
        debug!("deleting item {}", id);
        match store {
            Store::Postgres(pool) => {
                let deleted: Option<(i32,)> =
                    sqlx::query_as("DELETE FROM todolist_items WHERE id = $1 RETURNING id")
                        .bind(id)
                        .fetch_optional(pool)
                        .await?;

                deleted.map(|(id,)| id).ok_or_else(|| item_not_found(id))
            }
            Store::Memory(memory) => memory.delete_item(id),
        }
    }
}

impl User {
    /// Looks the user up by identity-provider subject, creating it on first sight.
    pub async fn find_or_create(claims: &Claims, store: &Store) -> Result<User> {
        debug!("finding user {}", claims.sub);
        match store {
            Store::Postgres(pool) => {
                let user = sqlx::query_as::<_, User>(
                    r#"
                        INSERT INTO users (subject, email, name) VALUES ($1, $2, $3)
                        ON CONFLICT (subject) DO UPDATE SET email = EXCLUDED.email, name = EXCLUDED.name
                        RETURNING id, subject, email, name
                    "#,
                )
                .bind(&claims.sub)
                .bind(&claims.email)
                .bind(&claims.name)
                .fetch_one(pool)
                .await?;

                Ok(user)
            }
            Store::Memory(memory) => memory.find_or_create_user(claims),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn store() -> Store {
        Store::Memory(Memory::default())
    }

    fn new_list(name: &str, user_id: i32) -> NewList {
        NewList {
            name: name.to_owned(),
            user_id,
        }
    }

    fn new_item(item: &str, todolist_id: i32) -> NewItem {
        NewItem {
            item: item.to_owned(),
            todolist_id,
        }
    }

    #[async_std::test]
    async fn created_list_is_found_by_user() -> Result<()> {
        let store = store();
        let created = List::create(new_list("groceries", 7), &store).await?;
        List::create(new_list("chores", 8), &store).await?;

        assert_eq!(List::find_by_user(7, &store).await?, vec![created]);
        Ok(())
    }

    #[async_std::test]
    async fn update_only_touches_the_target() -> Result<()> {
        let store = store();
        let first = List::create(new_list("groceries", 7), &store).await?;
        let second = List::create(new_list("chores", 7), &store).await?;

        let updated = List::update(new_list("shopping", 7), first.id, &store).await?;

        assert_eq!(
            List::find_by_user(7, &store).await?,
            vec![updated.clone(), second]
        );
        assert_eq!(updated.name, "shopping");
        Ok(())
    }

    #[async_std::test]
    async fn update_can_move_a_list_to_another_user() -> Result<()> {
        let store = store();
        let list = List::create(new_list("groceries", 7), &store).await?;

        List::update(new_list("groceries", 9), list.id, &store).await?;

        assert!(List::find_by_user(7, &store).await?.is_empty());
        assert_eq!(List::find_by_user(9, &store).await?.len(), 1);
        Ok(())
    }

    #[async_std::test]
    async fn unknown_ids_are_errors() {
        let store = store();

        let update = List::update(new_list("x", 1), 42, &store).await;
        let delete = Item::delete(42, &store).await;

        assert_eq!(update.unwrap_err().to_string(), "no list with id 42");
        assert_eq!(delete.unwrap_err().to_string(), "no item with id 42");
    }

    #[async_std::test]
    async fn item_mutations_return_the_whole_list() -> Result<()> {
        let store = store();
        let list = List::create(new_list("groceries", 1), &store).await?;
        let other = List::create(new_list("chores", 1), &store).await?;

        Item::create(new_item("milk", list.id), &store).await?;
        Item::create(new_item("sweep", other.id), &store).await?;
        let items = Item::create(new_item("eggs", list.id), &store).await?;

        let texts: Vec<_> = items.iter().map(|i| i.item.as_str()).collect();
        assert_eq!(texts, vec!["milk", "eggs"]);

        let items = Item::update(new_item("oat milk", list.id), items[0].id, &store).await?;
        let texts: Vec<_> = items.iter().map(|i| i.item.as_str()).collect();
        assert_eq!(texts, vec!["oat milk", "eggs"]);
        Ok(())
    }

    #[async_std::test]
    async fn item_needs_an_existing_list() {
        let store = store();

        let created = Item::create(new_item("milk", 3), &store).await;

        assert_eq!(created.unwrap_err().to_string(), "no list with id 3");
    }
}
