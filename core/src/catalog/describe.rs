use std::sync::Arc;

use async_trait::async_trait;

use crate::traits::{ChatMessage, ChatRequest, Provider, SkillDescriber};

pub const SKILL_PROMPT: &str = "You are a helpful assistant that writes a description of the given function written in Mineflayer javascript code.

1) Do not mention the function name.
2) Do not mention anything about `bot.chat` or helper functions.
3) There might be some helper functions before the main function, but you only need to describe the main function.
4) Try to summarize the function in no more than 6 sentences.
5) Your response should be a single line of text.

For example, if the function is:

async function mineCobblestone(bot) {
  // Check if the wooden pickaxe is in the inventory, if not, craft one
  let woodenPickaxe = bot.inventory.findInventoryItem(mcData.itemsByName[\"wooden_pickaxe\"].id);
  if (!woodenPickaxe) {
    bot.chat(\"Crafting a wooden pickaxe.\");
    await craftWoodenPickaxe(bot);
    woodenPickaxe = bot.inventory.findInventoryItem(mcData.itemsByName[\"wooden_pickaxe\"].id);
  }

  // Equip the wooden pickaxe if it exists
  if (woodenPickaxe) {
    await bot.equip(woodenPickaxe, \"hand\");

    // Explore until we find a stone block
    await exploreUntil(bot, new Vec3(1, -1, 1), 60, () => {
      const stone = bot.findBlock({
        matching: mcData.blocksByName[\"stone\"].id,
        maxDistance: 32
      });
      if (stone) {
        return true;
      }
    });

    // Mine 8 cobblestone blocks using the wooden pickaxe if it exists
    await mineBlock(bot, \"stone\", 8);
  }
}

The main function is `mineCobblestone`.

Then you would write:

The function is about mining 8 cobblestones using a wooden pickaxe. First check if a wooden pickaxe is in the inventory. If not, craft one. If the wooden pickaxe is available, equip the wooden pickaxe in the hand. Next, explore the environment until finding a stone block. Once a stone block is found, mine a total of 8 cobblestone blocks using the wooden pickaxe.";

/// Wraps a generated summary in the stub that is stored and embedded as the
/// skill's description.
pub fn skill_stub(entry_point: &str, summary: &str) -> String {
    let mut stub = format!("async function {entry_point}(bot) {{\n");
    let lines: Vec<&str> = summary.trim().lines().collect();
    if lines.is_empty() {
        stub.push_str("    //\n");
    }
    for line in lines {
        stub.push_str("    // ");
        stub.push_str(line.trim_end());
        stub.push('\n');
    }
    stub.push('}');
    stub
}

/// Describes skills by asking a chat model.
pub struct LlmDescriber {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f64,
}

impl LlmDescriber {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.0,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl SkillDescriber for LlmDescriber {
    async fn describe(&self, entry_point: &str, code: &str) -> anyhow::Result<String> {
        let messages = [
            ChatMessage::system(SKILL_PROMPT),
            ChatMessage::user(format!(
                "{code}\n\nThe main function is `{entry_point}`."
            )),
        ];

        let response = self
            .provider
            .chat(ChatRequest { messages: &messages }, &self.model, self.temperature)
            .await?;

        let text = response.text_or_empty().trim();
        if text.is_empty() {
            anyhow::bail!(
                "{} returned an empty description for {}",
                self.provider.name(),
                entry_point
            );
        }
        Ok(text.to_string())
    }
}
