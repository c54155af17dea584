use super::db::{self, Store};
use async_graphql::{
    extensions::Logger, http::GraphiQLSource, Context, EmptySubscription, Error, Object, Result,
    Schema,
};
use tide::{http::mime, Body, Request, Response, StatusCode};

pub type TodolistsSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

pub fn build_schema(store: Store) -> TodolistsSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .extension(Logger)
        .data(store)
        .finish()
}

#[derive(Clone)]
pub struct State {
    pub schema: TodolistsSchema,
    pub store: Store,
}

impl State {
    pub fn new(store: Store) -> State {
        State {
            schema: build_schema(store.clone()),
            store,
        }
    }
}

fn persistence(err: anyhow::Error) -> Error {
    Error::new(err.to_string())
}

// deletions echo only the id
fn unpopulated(field: &str) -> Error {
    Error::new(format!("`{}` is not available on a deleted record", field))
}

pub struct List {
    id: i32,
    name: Option<String>,
    user_id: Option<i32>,
}

impl List {
    fn deleted(id: i32) -> Self {
        Self {
            id,
            name: None,
            user_id: None,
        }
    }
}

impl From<db::List> for List {
    fn from(d: db::List) -> Self {
        Self {
            id: d.id,
            name: Some(d.name),
            user_id: Some(d.user_id),
        }
    }
}

/// This represents a list of a user
#[Object(rename_fields = "snake_case")]
impl List {
    async fn id(&self) -> i32 {
        self.id
    }

    async fn name(&self) -> Result<&str> {
        self.name.as_deref().ok_or_else(|| unpopulated("name"))
    }

    async fn user_id(&self) -> Result<i32> {
        self.user_id.ok_or_else(|| unpopulated("user_id"))
    }
}

pub struct Item {
    id: i32,
    item: Option<String>,
    todolist_id: Option<i32>,
}

impl Item {
    fn deleted(id: i32) -> Self {
        Self {
            id,
            item: None,
            todolist_id: None,
        }
    }
}

impl From<db::Item> for Item {
    fn from(d: db::Item) -> Self {
        Self {
            id: d.id,
            item: Some(d.item),
            todolist_id: Some(d.todolist_id),
        }
    }
}

/// This represents an item of a list
#[Object(rename_fields = "snake_case")]
impl Item {
    async fn id(&self) -> i32 {
        self.id
    }

    async fn item(&self) -> Result<&str> {
        self.item.as_deref().ok_or_else(|| unpopulated("item"))
    }

    async fn todolist_id(&self) -> Result<i32> {
        self.todolist_id.ok_or_else(|| unpopulated("todolist_id"))
    }
}

pub struct QueryRoot;

#[Object(rename_args = "snake_case")]
impl QueryRoot {
    /// The lists of a user
    async fn lists(&self, context: &Context<'_>, user_id: i32) -> Result<Vec<List>> {
        let store = context.data::<Store>()?;
        let lists = db::List::find_by_user(user_id, store)
            .await
            .map_err(persistence)?;
        Ok(lists.into_iter().map(Into::into).collect())
    }

    /// The items of a list
    async fn items(&self, context: &Context<'_>, todolist_id: i32) -> Result<Vec<Item>> {
        let store = context.data::<Store>()?;
        let items = db::Item::find_by_list(todolist_id, store)
            .await
            .map_err(persistence)?;
        Ok(items.into_iter().map(Into::into).collect())
    }
}

pub struct MutationRoot;

#[Object(rename_args = "snake_case")]
impl MutationRoot {
    /// Add a list (returns the created list)
    async fn add_list(&self, context: &Context<'_>, name: String, user_id: i32) -> Result<List> {
        let store = context.data::<Store>()?;
        let list = db::NewList { name, user_id };
        let list = db::List::create(list, store).await.map_err(persistence)?;
        Ok(list.into())
    }

    /// Update a list (returns the updated list)
    async fn update_list(
        &self,
        context: &Context<'_>,
        id: i32,
        name: String,
        user_id: i32,
    ) -> Result<List> {
        let store = context.data::<Store>()?;
        let list = db::NewList { name, user_id };
        let list = db::List::update(list, id, store)
            .await
            .map_err(persistence)?;
        Ok(list.into())
    }

    /// Delete a list and its items (returns only the id)
    async fn delete_list(&self, context: &Context<'_>, id: i32) -> Result<List> {
        let store = context.data::<Store>()?;
        let id = db::List::delete(id, store).await.map_err(persistence)?;
        Ok(List::deleted(id))
    }

    /// Add an item (returns all items of its list)
    async fn add_item(
        &self,
        context: &Context<'_>,
        todolist_id: i32,
        item: String,
    ) -> Result<Vec<Item>> {
        let store = context.data::<Store>()?;
        let item = db::NewItem { item, todolist_id };
        let items = db::Item::create(item, store).await.map_err(persistence)?;
        Ok(items.into_iter().map(Into::into).collect())
    }

    /// Update an item (returns all items of its list)
    async fn update_item(
        &self,
        context: &Context<'_>,
        id: i32,
        item: String,
        todolist_id: i32,
    ) -> Result<Vec<Item>> {
        let store = context.data::<Store>()?;
        let item = db::NewItem { item, todolist_id };
        let items = db::Item::update(item, id, store)
            .await
            .map_err(persistence)?;
        Ok(items.into_iter().map(Into::into).collect())
    }

    /// Delete an item (returns only the id)
    async fn delete_item(&self, context: &Context<'_>, id: i32) -> Result<Item> {
        let store = context.data::<Store>()?;
        let id = db::Item::delete(id, store).await.map_err(persistence)?;
        Ok(Item::deleted(id))
    }
}

pub async fn handle_graphql(req: Request<State>) -> tide::Result {
    let schema = req.state().schema.clone();
    let request = async_graphql_tide::receive_request(req).await?;
    async_graphql_tide::respond(schema.execute(request).await)
}

pub async fn handle_graphiql(_: Request<State>) -> tide::Result {
    let mut response = Response::new(StatusCode::Ok);
    response.set_body(Body::from_string(
        GraphiQLSource::build().endpoint("/graphql").finish(),
    ));
    response.set_content_type(mime::HTML);

    Ok(response)
}
