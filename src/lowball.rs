use serenity::all::{
    ActionRow, ActionRowComponent, CreateActionRow, CreateInputText, CreateModal, InputTextStyle,
    RoleId, UserId,
};

pub const MODAL_ID: &str = "lowball_modal";
pub const CAR_INPUT_ID: &str = "car_input";
pub const PRICE_INPUT_ID: &str = "price_input";
pub const LINK_INPUT_ID: &str = "link_input";

/// A completed `lowball_modal`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub car: String,
    pub price: String,
    pub link: String,
}

pub fn submission_modal() -> CreateModal {
    let input = |label: &str, custom_id: &str, max_length: u16| {
        CreateActionRow::InputText(
            CreateInputText::new(InputTextStyle::Short, label, custom_id)
                .required(true)
                .max_length(max_length),
        )
    };

    CreateModal::new(MODAL_ID, "Lowball Method Submission").components(vec![
        input("Car (e.g., 2011 BMW 3 Series)", CAR_INPUT_ID, 100),
        input("Lowball Price", PRICE_INPUT_ID, 20),
        input("Facebook Marketplace Link", LINK_INPUT_ID, 500),
    ])
}

fn input_value(rows: &[ActionRow], custom_id: &str) -> Option<String> {
    rows.iter()
        .flat_map(|row| row.components.iter())
        .find_map(|component| match component {
            ActionRowComponent::InputText(input) if input.custom_id == custom_id => {
                input.value.clone()
            }
            _ => None,
        })
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl Submission {
    /// Returns `None` when any of the three inputs is missing or blank.
    pub fn from_components(rows: &[ActionRow]) -> Option<Self> {
        Some(Self {
            car: input_value(rows, CAR_INPUT_ID)?,
            price: input_value(rows, PRICE_INPUT_ID)?,
            link: input_value(rows, LINK_INPUT_ID)?,
        })
    }

    /// The post sent to the lowball channel.
    ///
    /// The link is wrapped in `<>` so Discord does not unfurl a preview.
    pub fn render(&self, author: UserId, ping_role: Option<RoleId>) -> String {
        let mut post = String::new();
        if let Some(role) = ping_role {
            post.push_str(&format!("||<@&{}>||\n\n", role));
        }
        post.push_str(&format!(
            "# **Lowball this {car}!**\n\nThis is a **{car}** for **<@{author}>** and you guys need to lowball the person for **{price}**. Here is the marketplace link **<{link}>**",
            car = self.car,
            author = author,
            price = self.price,
            link = self.link,
        ));
        post
    }
}
