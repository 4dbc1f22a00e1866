//! Text commands for editing the metadata of the selected tile
//!
//! ```text
//! set_meta bg_color|win_color|obj_color R G B
//! set_meta all_z Z
//! set_meta bg_for_z|bg_back_z|win_z|obj_z|obj_behind_z Z
//! set_flags|add_flags|clear_flags FLAG...
//! save_meta FILE
//! load_meta FILE
//! ```

use crate::graphics::Color;
use crate::metadata::{MetadataError, MetadataFlags, MetadataUpdate};
use std::fmt::{Display, Formatter};
use std::num::ParseIntError;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("bad format, expected: {0}")]
    BadFormat(&'static str),
    #[error("invalid number '{value}': {source}")]
    InvalidNumber {
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("depth {z} is out of range; only {z_layers} layers are configured")]
    DepthOutOfRange { z: u32, z_layers: usize },
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorField {
    Background,
    Window,
    Sprite,
}

impl ColorField {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "bg_color" => Some(Self::Background),
            "win_color" => Some(Self::Window),
            "obj_color" => Some(Self::Sprite),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Background => "bg_color",
            Self::Window => "win_color",
            Self::Sprite => "obj_color",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthField {
    BackgroundFront,
    BackgroundBack,
    Window,
    Sprite,
    SpriteBehindBackground,
}

impl DepthField {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "bg_for_z" => Some(Self::BackgroundFront),
            "bg_back_z" => Some(Self::BackgroundBack),
            "win_z" => Some(Self::Window),
            "obj_z" => Some(Self::Sprite),
            "obj_behind_z" => Some(Self::SpriteBehindBackground),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::BackgroundFront => "bg_for_z",
            Self::BackgroundBack => "bg_back_z",
            Self::Window => "win_z",
            Self::Sprite => "obj_z",
            Self::SpriteBehindBackground => "obj_behind_z",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagOp {
    Set,
    Add,
    Clear,
}

impl FlagOp {
    fn name(self) -> &'static str {
        match self {
            Self::Set => "set_flags",
            Self::Add => "add_flags",
            Self::Clear => "clear_flags",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditCommand {
    SetColor { field: ColorField, color: Color },
    SetAllDepths(u32),
    SetDepth { field: DepthField, z: u32 },
    Flags { op: FlagOp, flags: MetadataFlags },
    Save(String),
    Load(String),
}

const SET_META_USAGE: &str = "set_meta <bg_color|win_color|obj_color> R G B \
     | set_meta all_z Z | set_meta <bg_for_z|bg_back_z|win_z|obj_z|obj_behind_z> Z";
const FLAGS_USAGE: &str = "<set_flags|add_flags|clear_flags> <draw_obj_c0|N>...";
const SAVE_USAGE: &str = "save_meta FILE";
const LOAD_USAGE: &str = "load_meta FILE";

impl EditCommand {
    /// Parse an already tokenized command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command is unknown, has the wrong number of arguments, or has an
    /// argument that is not a valid number.
    pub fn from_args(args: &[&str]) -> Result<Self, CommandError> {
        let Some((&command, args)) = args.split_first() else {
            return Err(CommandError::Empty);
        };

        match command {
            "set_meta" => parse_set_meta(args),
            "set_flags" | "add_flags" | "clear_flags" => {
                let op = match command {
                    "set_flags" => FlagOp::Set,
                    "add_flags" => FlagOp::Add,
                    _ => FlagOp::Clear,
                };
                if args.is_empty() {
                    return Err(CommandError::BadFormat(FLAGS_USAGE));
                }
                let flags = args
                    .iter()
                    .map(|&arg| parse_flag(arg))
                    .try_fold(MetadataFlags::NONE, |acc, flag| flag.map(|flag| acc | flag))?;
                Ok(Self::Flags { op, flags })
            }
            "save_meta" => match args {
                [file] => Ok(Self::Save((*file).into())),
                _ => Err(CommandError::BadFormat(SAVE_USAGE)),
            },
            "load_meta" => match args {
                [file] => Ok(Self::Load((*file).into())),
                _ => Err(CommandError::BadFormat(LOAD_USAGE)),
            },
            _ => Err(CommandError::UnknownCommand(command.into())),
        }
    }

    /// The metadata change this command makes, if it edits fields directly.
    #[must_use]
    pub fn to_update(&self) -> Option<MetadataUpdate> {
        let update = match *self {
            Self::SetColor { field, color } => match field {
                ColorField::Background => {
                    MetadataUpdate { bg_color: Some(color), ..MetadataUpdate::default() }
                }
                ColorField::Window => {
                    MetadataUpdate { win_color: Some(color), ..MetadataUpdate::default() }
                }
                ColorField::Sprite => {
                    MetadataUpdate { obj_color: Some(color), ..MetadataUpdate::default() }
                }
            },
            Self::SetAllDepths(z) => MetadataUpdate::all_depths(z),
            Self::SetDepth { field, z } => match field {
                DepthField::BackgroundFront => {
                    MetadataUpdate { bg_front_z: Some(z), ..MetadataUpdate::default() }
                }
                DepthField::BackgroundBack => {
                    MetadataUpdate { bg_back_z: Some(z), ..MetadataUpdate::default() }
                }
                DepthField::Window => {
                    MetadataUpdate { win_z: Some(z), ..MetadataUpdate::default() }
                }
                DepthField::Sprite => {
                    MetadataUpdate { obj_z: Some(z), ..MetadataUpdate::default() }
                }
                DepthField::SpriteBehindBackground => {
                    MetadataUpdate { obj_behind_z: Some(z), ..MetadataUpdate::default() }
                }
            },
            Self::Flags { .. } | Self::Save(_) | Self::Load(_) => return None,
        };

        Some(update)
    }

    /// Reject depths that don't name a configured layer.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::DepthOutOfRange`] if the command sets a depth `>= z_layers`.
    pub fn validate(&self, z_layers: usize) -> Result<(), CommandError> {
        match *self {
            Self::SetAllDepths(z) | Self::SetDepth { z, .. } if z as usize >= z_layers => {
                Err(CommandError::DepthOutOfRange { z, z_layers })
            }
            _ => Ok(()),
        }
    }
}

impl FromStr for EditCommand {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let args: Vec<_> = s.split_whitespace().collect();
        Self::from_args(&args)
    }
}

impl Display for EditCommand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SetColor { field, color } => {
                write!(f, "set_meta {} {} {} {}", field.name(), color.r, color.g, color.b)
            }
            Self::SetAllDepths(z) => write!(f, "set_meta all_z {z}"),
            Self::SetDepth { field, z } => write!(f, "set_meta {} {z}", field.name()),
            Self::Flags { op, flags } => write!(f, "{} {:#X}", op.name(), flags.bits()),
            Self::Save(file) => write!(f, "save_meta {file}"),
            Self::Load(file) => write!(f, "load_meta {file}"),
        }
    }
}

fn parse_set_meta(args: &[&str]) -> Result<EditCommand, CommandError> {
    match *args {
        [field, r, g, b] => {
            let field = ColorField::parse(field).ok_or(CommandError::BadFormat(SET_META_USAGE))?;
            let color = Color::rgb(parse_number(r)?, parse_number(g)?, parse_number(b)?);
            Ok(EditCommand::SetColor { field, color })
        }
        ["all_z", z] => Ok(EditCommand::SetAllDepths(parse_number(z)?)),
        [field, z] => {
            let field = DepthField::parse(field).ok_or(CommandError::BadFormat(SET_META_USAGE))?;
            Ok(EditCommand::SetDepth { field, z: parse_number(z)? })
        }
        _ => Err(CommandError::BadFormat(SET_META_USAGE)),
    }
}

fn parse_flag(arg: &str) -> Result<MetadataFlags, CommandError> {
    match arg {
        "draw_obj_c0" => Ok(MetadataFlags::DRAW_OBJ_ON_COLOR0),
        _ => {
            let bits = match arg.strip_prefix("0x") {
                Some(hex) => u32::from_str_radix(hex, 16),
                None => arg.parse(),
            };
            bits.map(MetadataFlags::from_bits)
                .map_err(|source| CommandError::InvalidNumber { value: arg.into(), source })
        }
    }
}

fn parse_number<T: FromStr<Err = ParseIntError>>(arg: &str) -> Result<T, CommandError> {
    arg.parse().map_err(|source| CommandError::InvalidNumber { value: arg.into(), source })
}
