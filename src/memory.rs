use anyhow::{anyhow, Result};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{
    auth::Claims,
    db::{item_not_found, list_not_found, Item, List, NewItem, NewList, User},
};

/// In-process store for local development and tests. Ids start at 1 and are
/// never reused.
#[derive(Clone, Default)]
pub struct Memory {
    tables: Arc<RwLock<Tables>>,
}

#[derive(Default)]
struct Tables {
    lists: Vec<List>,
    items: Vec<Item>,
    users: Vec<User>,
    last_list_id: i32,
    last_item_id: i32,
    last_user_id: i32,
}

impl Memory {
    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| anyhow!("memory store is poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| anyhow!("memory store is poisoned"))
    }

    pub fn lists_by_user(&self, user_id: i32) -> Result<Vec<List>> {
        let tables = self.read()?;
        Ok(tables
            .lists
            .iter()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect())
    }

    pub fn create_list(&self, list: NewList) -> Result<List> {
        let mut tables = self.write()?;
        let list = List {
            id: next_id(&mut tables.last_list_id)?,
            name: list.name,
            user_id: list.user_id,
        };
        tables.lists.push(list.clone());
        Ok(list)
    }

    pub fn update_list(&self, list: NewList, id: i32) -> Result<List> {
        let mut tables = self.write()?;
        let existing = tables
            .lists
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| list_not_found(id))?;
        existing.name = list.name;
        existing.user_id = list.user_id;
        Ok(existing.clone())
    }

    pub fn delete_list(&self, id: i32) -> Result<i32> {
        let mut tables = self.write()?;
        let position = tables
            .lists
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| list_not_found(id))?;
        tables.lists.remove(position);
        tables.items.retain(|i| i.todolist_id != id);
        Ok(id)
    }

    pub fn items_by_list(&self, todolist_id: i32) -> Result<Vec<Item>> {
        let tables = self.read()?;
        Ok(tables
            .items
            .iter()
            .filter(|i| i.todolist_id == todolist_id)
            .cloned()
            .collect())
    }

    pub fn create_item(&self, item: NewItem) -> Result<Item> {
        let mut tables = self.write()?;
        tables.ensure_list(item.todolist_id)?;
        let item = Item {
            id: next_id(&mut tables.last_item_id)?,
            item: item.item,
            todolist_id: item.todolist_id,
        };
        tables.items.push(item.clone());
        Ok(item)
    }

    pub fn update_item(&self, item: NewItem, id: i32) -> Result<Item> {
        let mut tables = self.write()?;
        tables.ensure_list(item.todolist_id)?;
        let existing = tables
            .items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| item_not_found(id))?;
        existing.item = item.item;
        existing.todolist_id = item.todolist_id;
        Ok(existing.clone())
    }

    pub fn delete_item(&self, id: i32) -> Result<i32> {
        let mut tables = self.write()?;
        let position = tables
            .items
            .iter()
            .position(|i| i.id == id)
            .ok_or_else(|| item_not_found(id))?;
        tables.items.remove(position);
        Ok(id)
    }

    pub fn find_or_create_user(&self, claims: &Claims) -> Result<User> {
        let mut tables = self.write()?;
        if let Some(user) = tables.users.iter_mut().find(|u| u.subject == claims.sub) {
            user.email = claims.email.clone();
            user.name = claims.name.clone();
            return Ok(user.clone());
        }

        let user = User {
            id: next_id(&mut tables.last_user_id)?,
            subject: claims.sub.clone(),
            email: claims.email.clone(),
            name: claims.name.clone(),
        };
        tables.users.push(user.clone());
        Ok(user)
    }
}

fn next_id(last: &mut i32) -> Result<i32> {
    *last = last
        .checked_add(1)
        .ok_or_else(|| anyhow!("id space exhausted"))?;
    Ok(*last)
}

impl Tables {
    // stands in for the foreign key on todolist_items
    fn ensure_list(&self, id: i32) -> Result<()> {
        if self.lists.iter().any(|l| l.id == id) {
            Ok(())
        } else {
            Err(list_not_found(id))
        }
    }
}
