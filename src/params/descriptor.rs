use super::validation::Constraint;

/// Declared field of a structured parameter type
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub constraints: Vec<Constraint>,
}

/// Runtime description of a structured parameter type
///
/// Stands in for the class a plain value is transformed into: it names the
/// type and lists the declared fields with their validation constraints.
/// Fields that are not declared are still carried by instances.
///
/// ```rust,ignore
/// let filter = TypeDescriptor::new("UserFilter")
///     .field("keyword", vec![Constraint::Length { min: 5, max: Some(15) }]);
/// ```
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, constraints: Vec<Constraint>) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.into(),
            constraints,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn declares(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f.name == field)
    }
}
