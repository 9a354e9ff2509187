use crate::models::template::{Question, Template};
use crate::services::context::Context;

/// Questions of `template` that should be shown for `ctx`, in template order.
pub fn render<'a>(template: &'a Template, ctx: &Context) -> Vec<&'a Question> {
    template
        .questions
        .iter()
        .filter(|q| is_visible(q, ctx))
        .collect()
}

pub fn is_visible(question: &Question, ctx: &Context) -> bool {
    question
        .condition
        .as_ref()
        .map_or(true, |condition| condition.evaluate(ctx))
}
