use crate::core::persona::{builtin_personas, PersonaId};

pub fn persona_table(selected: Option<PersonaId>) -> String {
    let mut table = String::from("Personas:\n\n");
    for persona in builtin_personas() {
        let marker = if selected == Some(persona.id) { "*" } else { " " };
        table.push_str(&format!(
            "{marker} {:<8} {}\n",
            persona.id, persona.full_name
        ));
    }
    table
}

pub fn list_personas(selected: Option<PersonaId>) {
    print!("{}", persona_table(selected));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_marks_the_selected_persona() {
        let table = persona_table(Some(PersonaId::Fangnai));
        assert!(table.contains("* fangnai  朝武芳乃"));
        assert!(table.contains("  congyu   丛雨"));
        assert_eq!(table.lines().filter(|l| l.contains('*')).count(), 1);
    }
}
