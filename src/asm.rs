//! Structured builder for tiny 16-bit real-mode programs.
//!
//! Programs are assembled as records (registers, immediates, labels) and only
//! serialized to GNU assembler text (AT&T syntax) at the end, so generation
//! stays testable independent of text formatting. Every rendered program
//! enters at `_start16` with `.code16` in effect; the flat-binary link step
//! places `.text` at offset 0x100, the load address of a header-less DOS
//! program.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg8 {
    Al,
    Ah,
    Bl,
    Bh,
    Cl,
    Ch,
    Dl,
    Dh,
}

impl Reg8 {
    fn name(self) -> &'static str {
        match self {
            Reg8::Al => "al",
            Reg8::Ah => "ah",
            Reg8::Bl => "bl",
            Reg8::Bh => "bh",
            Reg8::Cl => "cl",
            Reg8::Ch => "ch",
            Reg8::Dl => "dl",
            Reg8::Dh => "dh",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg16 {
    Ax,
    Bx,
    Cx,
    Dx,
    Si,
    Di,
    Bp,
    Sp,
}

impl Reg16 {
    fn name(self) -> &'static str {
        match self {
            Reg16::Ax => "ax",
            Reg16::Bx => "bx",
            Reg16::Cx => "cx",
            Reg16::Dx => "dx",
            Reg16::Si => "si",
            Reg16::Di => "di",
            Reg16::Bp => "bp",
            Reg16::Sp => "sp",
        }
    }
}

/// A 16-bit immediate: an absolute value or a reference to a label defined in
/// the same program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Imm {
    Abs(u16),
    Label(String),
}

impl fmt::Display for Imm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Imm::Abs(value) => write!(f, "$0x{value:x}"),
            Imm::Label(name) => write!(f, "${name}"),
        }
    }
}

/// The instruction repertoire needed by the DOS-interrupt test programs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Insn {
    MovImm8(Reg8, u8),
    MovImm16(Reg16, Imm),
    Int(u8),
    PushCs,
    PopDs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Item {
    Label(String),
    Insn(Insn),
    Ascii(String),
    Space(u16),
}

/// A program under construction. Fluent: each method consumes and returns the
/// builder, so programs read top to bottom like the assembly they produce.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    items: Vec<Item>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insn(mut self, insn: Insn) -> Self {
        self.items.push(Item::Insn(insn));
        self
    }

    pub fn mov8(self, reg: Reg8, value: u8) -> Self {
        self.insn(Insn::MovImm8(reg, value))
    }

    pub fn mov16(self, reg: Reg16, imm: Imm) -> Self {
        self.insn(Insn::MovImm16(reg, imm))
    }

    pub fn mov16_label(self, reg: Reg16, label: &str) -> Self {
        self.mov16(reg, Imm::Label(label.to_string()))
    }

    pub fn int(self, vector: u8) -> Self {
        self.insn(Insn::Int(vector))
    }

    /// `push %cs` / `pop %ds`: point the data segment at the code segment,
    /// where a flat binary keeps its string data.
    pub fn data_segment_from_cs(self) -> Self {
        self.insn(Insn::PushCs).insn(Insn::PopDs)
    }

    /// Places the stack top at `top` within the current segment.
    pub fn stack_top(self, top: u16) -> Self {
        self.mov16(Reg16::Sp, Imm::Abs(top))
    }

    pub fn label(mut self, name: &str) -> Self {
        self.items.push(Item::Label(name.to_string()));
        self
    }

    /// A labelled `.ascii` blob. DOS string-output calls expect the text to
    /// end with `$`; the caller includes it.
    pub fn ascii(mut self, label: &str, text: &str) -> Self {
        self.items.push(Item::Label(label.to_string()));
        self.items.push(Item::Ascii(text.to_string()));
        self
    }

    /// A labelled zero-filled reservation of `bytes` bytes.
    pub fn space(mut self, label: &str, bytes: u16) -> Self {
        self.items.push(Item::Label(label.to_string()));
        self.items.push(Item::Space(bytes));
        self
    }

    /// AH=09h INT 21h: write the `$`-terminated string at `label`.
    pub fn print_dollar_string(self, label: &str) -> Self {
        self.mov8(Reg8::Ah, 0x09).mov16_label(Reg16::Dx, label).int(0x21)
    }

    /// AH=4Ch INT 21h: terminate the program.
    pub fn exit(self) -> Self {
        self.mov8(Reg8::Ah, 0x4c).int(0x21)
    }

    /// AH=00h INT 16h: block until a key press.
    pub fn wait_key(self) -> Self {
        self.mov8(Reg8::Ah, 0x00).int(0x16)
    }

    /// Serializes to assembler text. Pure: identical builders render to
    /// identical text.
    pub fn render(&self) -> String {
        let mut out = String::from(
            ".text\n.code16\n\n    .globl  _start16\n_start16:\n\n",
        );
        for item in &self.items {
            match item {
                Item::Label(name) => out.push_str(&format!("{name}:\n")),
                Item::Insn(insn) => out.push_str(&render_insn(insn)),
                Item::Ascii(text) => {
                    out.push_str(&format!("    .ascii  \"{}\"\n", escape_ascii(text)))
                }
                Item::Space(bytes) => out.push_str(&format!("    .space  {bytes}\n")),
            }
        }
        out
    }
}

fn render_insn(insn: &Insn) -> String {
    match insn {
        Insn::MovImm8(reg, value) => format!("    movb    $0x{:x}, %{}\n", value, reg.name()),
        Insn::MovImm16(reg, imm) => format!("    movw    {}, %{}\n", imm, reg.name()),
        Insn::Int(vector) => format!("    int     $0x{vector:x}\n"),
        Insn::PushCs => "    push    %cs\n".to_string(),
        Insn::PopDs => "    pop     %ds\n".to_string(),
    }
}

fn escape_ascii(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}
