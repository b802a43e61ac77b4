use crate::error::{GameError, GameResult};
use crate::model::{Bulb, PotKind, SoilKind, RAIN_BASE_PRICE, RAIN_PRICE_STEP};
use crate::store::{read_or, write_through, KeyValueStore};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

pub(crate) const KEY_POINTS: &str = "points";
pub(crate) const KEY_RAIN_PRICE: &str = "rainCloudPrice";
pub(crate) const KEY_POT: &str = "selectedPot";
pub(crate) const KEY_DIRT: &str = "dirtType";

pub const RAIN_ITEM_ID: &str = "rain";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShopCategory {
    Bulbs,
    Pots,
    Soils,
    Weather,
}

impl ShopCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ShopCategory::Bulbs => "bulbs",
            ShopCategory::Pots => "pots",
            ShopCategory::Soils => "soils",
            ShopCategory::Weather => "weather",
        }
    }
}

impl fmt::Display for ShopCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShopCategory {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bulb" | "bulbs" => Ok(ShopCategory::Bulbs),
            "pot" | "pots" => Ok(ShopCategory::Pots),
            "soil" | "soils" | "dirt" => Ok(ShopCategory::Soils),
            "weather" => Ok(ShopCategory::Weather),
            other => Err(GameError::validation(format!(
                "unknown shop category '{other}'"
            ))),
        }
    }
}

/// Fixed prices for one shop shelf.
#[derive(Clone, Copy, Debug)]
pub struct PriceTable {
    pub prices: &'static [(&'static str, u32)],
}

impl PriceTable {
    pub fn cost(&self, item_id: &str) -> Option<u32> {
        self.prices
            .iter()
            .find(|(id, _)| *id == item_id)
            .map(|(_, cost)| *cost)
    }
}

pub const BULB_PRICES: PriceTable = PriceTable {
    prices: &[("fluorescent", 10), ("led", 25), ("ultraviolet", 40)],
};

pub const POT_PRICES: PriceTable = PriceTable {
    prices: &[("terracotta", 15), ("ceramic", 30), ("hanging", 50)],
};

pub const SOIL_PRICES: PriceTable = PriceTable {
    prices: &[("potting", 10), ("loam", 20), ("peat", 30)],
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShopItem {
    Bulb(Bulb),
    Pot(PotKind),
    Soil(SoilKind),
    RainCloud,
}

impl ShopItem {
    pub fn parse(category: &str, item_id: &str) -> GameResult<Self> {
        let category: ShopCategory = category.parse()?;
        let item = match category {
            ShopCategory::Bulbs => ShopItem::Bulb(item_id.parse()?),
            ShopCategory::Pots => ShopItem::Pot(item_id.parse()?),
            ShopCategory::Soils => ShopItem::Soil(item_id.parse()?),
            ShopCategory::Weather => {
                if !item_id.trim().eq_ignore_ascii_case(RAIN_ITEM_ID) {
                    return Err(GameError::validation(format!(
                        "unknown weather effect '{}'",
                        item_id.trim()
                    )));
                }
                ShopItem::RainCloud
            }
        };
        Ok(item)
    }

    pub fn category(self) -> ShopCategory {
        match self {
            ShopItem::Bulb(_) => ShopCategory::Bulbs,
            ShopItem::Pot(_) => ShopCategory::Pots,
            ShopItem::Soil(_) => ShopCategory::Soils,
            ShopItem::RainCloud => ShopCategory::Weather,
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            ShopItem::Bulb(b) => b.as_str(),
            ShopItem::Pot(p) => p.as_str(),
            ShopItem::Soil(s) => s.as_str(),
            ShopItem::RainCloud => RAIN_ITEM_ID,
        }
    }
}

impl fmt::Display for ShopItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category(), self.id())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EconomyState {
    pub points: u32,
    pub selected_pot: Option<PotKind>,
    pub selected_soil: SoilKind,
    pub rain_cloud_price: u32,
}

impl Default for EconomyState {
    fn default() -> Self {
        Self {
            points: 0,
            selected_pot: None,
            selected_soil: SoilKind::default(),
            rain_cloud_price: RAIN_BASE_PRICE,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub item: ShopItem,
    pub cost: u32,
    pub balance: u32,
}

#[derive(Clone, Debug, Default)]
pub struct Economy {
    state: EconomyState,
}

impl Economy {
    pub fn new(state: EconomyState) -> Self {
        Self { state }
    }

    pub fn load(store: &dyn KeyValueStore) -> Self {
        let defaults = EconomyState::default();
        let selected_pot = store.get(KEY_POT).and_then(|raw| match raw.parse::<PotKind>() {
            Ok(pot) => Some(pot),
            Err(_) => {
                warn!(value = %raw, "unknown stored pot, ignoring");
                None
            }
        });
        let state = EconomyState {
            points: read_or(store, KEY_POINTS, defaults.points),
            selected_pot,
            selected_soil: read_or(store, KEY_DIRT, defaults.selected_soil),
            rain_cloud_price: read_or(store, KEY_RAIN_PRICE, defaults.rain_cloud_price)
                .max(RAIN_BASE_PRICE),
        };
        Self { state }
    }

    pub fn state(&self) -> &EconomyState {
        &self.state
    }

    pub fn points(&self) -> u32 {
        self.state.points
    }

    pub fn save_all(&self, store: &mut dyn KeyValueStore) {
        let st = &self.state;
        write_through(store, KEY_POINTS, st.points);
        write_through(store, KEY_RAIN_PRICE, st.rain_cloud_price);
        write_through(store, KEY_DIRT, st.selected_soil.as_str());
        if let Some(pot) = st.selected_pot {
            write_through(store, KEY_POT, pot.as_str());
        }
    }

    /// Current price. Rain is the only item whose price moves.
    pub fn price_of(&self, item: ShopItem) -> u32 {
        let table = match item.category() {
            ShopCategory::Bulbs => BULB_PRICES,
            ShopCategory::Pots => POT_PRICES,
            ShopCategory::Soils => SOIL_PRICES,
            ShopCategory::Weather => return self.state.rain_cloud_price,
        };
        // Every enum variant has a row; the fallback is unreachable.
        table.cost(item.id()).unwrap_or(u32::MAX)
    }

    pub fn catalogue(&self) -> Vec<(ShopItem, u32)> {
        let mut items: Vec<ShopItem> = Vec::new();
        items.extend(Bulb::ALL.into_iter().map(ShopItem::Bulb));
        items.extend(PotKind::ALL.into_iter().map(ShopItem::Pot));
        items.extend(SoilKind::ALL.into_iter().map(ShopItem::Soil));
        items.push(ShopItem::RainCloud);
        items
            .into_iter()
            .map(|item| (item, self.price_of(item)))
            .collect()
    }

    pub fn earn(&mut self, store: &mut dyn KeyValueStore, amount: u32) -> u32 {
        self.state.points = self.state.points.saturating_add(amount);
        write_through(store, KEY_POINTS, self.state.points);
        debug!(amount, balance = self.state.points, "points earned");
        self.state.points
    }

    /// Deducts the price or fails without touching anything.
    pub fn purchase(
        &mut self,
        store: &mut dyn KeyValueStore,
        item: ShopItem,
    ) -> GameResult<Receipt> {
        let cost = self.price_of(item);
        let balance = self.state.points;
        if balance < cost {
            debug!(%item, cost, balance, "purchase rejected");
            return Err(GameError::InsufficientFunds {
                cost,
                balance,
                shortfall: cost - balance,
            });
        }

        self.state.points = balance - cost;
        write_through(store, KEY_POINTS, self.state.points);

        match item {
            ShopItem::Pot(pot) => {
                self.state.selected_pot = Some(pot);
                write_through(store, KEY_POT, pot.as_str());
            }
            ShopItem::Soil(soil) => {
                self.state.selected_soil = soil;
                write_through(store, KEY_DIRT, soil.as_str());
            }
            ShopItem::RainCloud => {
                self.state.rain_cloud_price =
                    self.state.rain_cloud_price.saturating_add(RAIN_PRICE_STEP);
                write_through(store, KEY_RAIN_PRICE, self.state.rain_cloud_price);
            }
            ShopItem::Bulb(_) => {}
        }

        info!(%item, cost, balance = self.state.points, "purchased");
        Ok(Receipt {
            item,
            cost,
            balance: self.state.points,
        })
    }
}
