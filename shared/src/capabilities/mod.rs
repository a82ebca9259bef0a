mod graphql;
mod navigation;
mod timer;

pub use self::graphql::{
    edit_expense_mutation, expense_page_query, EditExpenseData, EditExpenseVariables,
    ExpensePageVariables, GraphqlClient, GraphqlError, GraphqlErrorEntry, GraphqlRequest,
    GraphqlResponse, GraphqlResult, EDIT_EXPENSE_OPERATION, EXPENSE_PAGE_OPERATION,
};
pub use self::navigation::{Navigation, NavigationOperation};
pub use self::timer::{Timer, TimerId, TimerOperation, TimerOutput};

pub use crux_core::render::Render;
pub use crux_http::Http;

use crate::app::App;
use crate::event::Event;

#[derive(crux_core::macros::Effect)]
#[effect(app = "App")]
pub struct Capabilities {
    pub http: Http<Event>,
    pub render: Render<Event>,
    pub timer: Timer<Event>,
    pub navigation: Navigation<Event>,
}
