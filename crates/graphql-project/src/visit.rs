use apollo_compiler::ast::OperationType;
use apollo_compiler::Schema;
use apollo_parser::cst;

/// One field selection, with the type it is selected on
pub struct FieldVisit<'a> {
    pub field: &'a cst::Field,
    pub parent_type: &'a str,
    /// Whether the field or an enclosing selection carries `@client`
    pub in_client_context: bool,
}

pub(crate) fn operation_type(operation: &cst::OperationDefinition) -> OperationType {
    match operation.operation_type() {
        Some(op) if op.mutation_token().is_some() => OperationType::Mutation,
        Some(op) if op.subscription_token().is_some() => OperationType::Subscription,
        _ => OperationType::Query,
    }
}

pub(crate) const fn operation_keyword(operation_type: OperationType) -> &'static str {
    match operation_type {
        OperationType::Query => "query",
        OperationType::Mutation => "mutation",
        OperationType::Subscription => "subscription",
    }
}

pub(crate) fn has_directive(directives: Option<cst::Directives>, name: &str) -> bool {
    directives.is_some_and(|directives| {
        directives
            .directives()
            .any(|d| d.name().is_some_and(|n| n.text() == name))
    })
}

/// Walk every field selection in the executable definitions of `document`,
/// resolving each field's parent type against `schema`.
///
/// Fields whose parent type cannot be resolved are skipped along with their
/// sub-selections. Fragment spreads are not followed.
pub(crate) fn walk_fields(
    document: &cst::Document,
    schema: &Schema,
    visit: &mut dyn FnMut(FieldVisit<'_>),
) {
    for definition in document.definitions() {
        match definition {
            cst::Definition::OperationDefinition(operation) => {
                let Some(root) = schema.root_operation(operation_type(&operation)) else {
                    continue;
                };
                if let Some(selection_set) = operation.selection_set() {
                    walk_selection_set(&selection_set, root.as_str(), false, schema, visit);
                }
            }
            cst::Definition::FragmentDefinition(fragment) => {
                let Some(type_name) = fragment
                    .type_condition()
                    .and_then(|condition| condition.named_type())
                    .and_then(|named| named.name())
                else {
                    continue;
                };
                let in_client = has_directive(fragment.directives(), "client");
                if let Some(selection_set) = fragment.selection_set() {
                    walk_selection_set(
                        &selection_set,
                        type_name.text().as_str(),
                        in_client,
                        schema,
                        visit,
                    );
                }
            }
            _ => {}
        }
    }
}

fn walk_selection_set(
    selection_set: &cst::SelectionSet,
    parent_type: &str,
    in_client: bool,
    schema: &Schema,
    visit: &mut dyn FnMut(FieldVisit<'_>),
) {
    for selection in selection_set.selections() {
        match selection {
            cst::Selection::Field(field) => {
                let Some(name) = field.name() else {
                    continue;
                };
                let field_in_client = in_client || has_directive(field.directives(), "client");
                visit(FieldVisit {
                    field: &field,
                    parent_type,
                    in_client_context: field_in_client,
                });

                let Some(nested) = field.selection_set() else {
                    continue;
                };
                if let Ok(definition) = schema.type_field(parent_type, name.text().as_str()) {
                    let nested_type = definition.ty.inner_named_type().as_str();
                    walk_selection_set(&nested, nested_type, field_in_client, schema, visit);
                }
            }
            cst::Selection::InlineFragment(inline) => {
                let type_name = inline
                    .type_condition()
                    .and_then(|condition| condition.named_type())
                    .and_then(|named| named.name())
                    .map(|name| name.text().to_string());
                let nested_client = in_client || has_directive(inline.directives(), "client");
                if let Some(nested) = inline.selection_set() {
                    walk_selection_set(
                        &nested,
                        type_name.as_deref().unwrap_or(parent_type),
                        nested_client,
                        schema,
                        visit,
                    );
                }
            }
            cst::Selection::FragmentSpread(_) => {}
        }
    }
}
