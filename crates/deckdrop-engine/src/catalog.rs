//! Catalog administration on the engine facade.

use deckdrop_core::{
  Error, Result,
  card::{CardDefinition, NewCard},
  store::{AddCard, DropStore},
  surface::{Messenger, Renderer},
};
use tracing::info;

use crate::DropEngine;

impl<S, M, R> DropEngine<S, M, R>
where
  S: DropStore,
  M: Messenger,
  R: Renderer,
{
  /// Validate and insert a new card definition. Names are unique regardless
  /// of case.
  pub async fn add_card(&self, card: NewCard) -> Result<CardDefinition> {
    let card = card.validate()?;
    let name = card.name.clone();
    let now = self.ctx.clock.now();

    match self.ctx.persist(self.ctx.store.add_card(card, now)).await? {
      AddCard::Created(card) => {
        info!(card_id = %card.card_id, name = %card.name, rarity = %card.rarity, "card added");
        Ok(card)
      }
      AddCard::NameTaken => Err(Error::CardNameConflict(name)),
    }
  }

  pub async fn list_cards(&self) -> Result<Vec<CardDefinition>> {
    self.ctx.persist(self.ctx.store.list_cards()).await
  }
}
