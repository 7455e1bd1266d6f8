//! The Schema Parser (§4.B): turns schema text into the Schema Model
//! of the parent module. The concrete surface syntax is the minimal
//! grammar documented in SPEC_FULL.md §3 — spec.md treats the exact
//! surface syntax as an external concern, so this grammar exists only
//! to give the CLI something real to read from `--schema`.

use super::{EnumDef, FieldDef, FieldType, IntWidth, ScalarDefault, Schema, TableDef};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Int(i128),
    Float(f64),
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Colon,
    Semi,
    Comma,
    Eq,
    Eof,
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    line: usize,
    col: usize,
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    src: &'a str,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Lexer {
            chars: src.char_indices().peekable(),
            src,
            line: 1,
            col: 1,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn err(&self, message: impl Into<String>) -> Error {
        Error::ParseError {
            line: self.line,
            col: self.col,
            message: message.into(),
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut out = Vec::new();
        loop {
            while let Some(c) = self.peek_char() {
                if c.is_whitespace() {
                    self.bump();
                } else if c == '/' {
                    let mut it = self.chars.clone();
                    it.next();
                    if matches!(it.peek(), Some(&(_, '/'))) {
                        while let Some(c) = self.peek_char() {
                            if c == '\n' {
                                break;
                            }
                            self.bump();
                        }
                    } else {
                        break;
                    }
                } else {
                    break;
                }
            }
            let (line, col) = (self.line, self.col);
            let Some(c) = self.peek_char() else {
                out.push(Token {
                    tok: Tok::Eof,
                    line,
                    col,
                });
                break;
            };
            let tok = match c {
                '{' => {
                    self.bump();
                    Tok::LBrace
                }
                '}' => {
                    self.bump();
                    Tok::RBrace
                }
                '[' => {
                    self.bump();
                    Tok::LBracket
                }
                ']' => {
                    self.bump();
                    Tok::RBracket
                }
                ':' => {
                    self.bump();
                    Tok::Colon
                }
                ';' => {
                    self.bump();
                    Tok::Semi
                }
                ',' => {
                    self.bump();
                    Tok::Comma
                }
                '=' => {
                    self.bump();
                    Tok::Eq
                }
                c if c.is_ascii_digit() || c == '-' => {
                    let start = self.chars.peek().unwrap().0;
                    self.bump();
                    let mut is_float = false;
                    while let Some(c) = self.peek_char() {
                        if c.is_ascii_digit() {
                            self.bump();
                        } else if c == '.' && !is_float {
                            is_float = true;
                            self.bump();
                        } else {
                            break;
                        }
                    }
                    let end = self
                        .chars
                        .peek()
                        .map(|&(i, _)| i)
                        .unwrap_or(self.src.len());
                    let text = &self.src[start..end];
                    if is_float {
                        let v: f64 = text
                            .parse()
                            .map_err(|_| self.err(format!("invalid float literal {text:?}")))?;
                        Tok::Float(v)
                    } else {
                        let v: i128 = text
                            .parse()
                            .map_err(|_| self.err(format!("invalid integer literal {text:?}")))?;
                        Tok::Int(v)
                    }
                }
                c if c.is_alphabetic() || c == '_' => {
                    let start = self.chars.peek().unwrap().0;
                    while let Some(c) = self.peek_char() {
                        if c.is_alphanumeric() || c == '_' {
                            self.bump();
                        } else {
                            break;
                        }
                    }
                    let end = self
                        .chars
                        .peek()
                        .map(|&(i, _)| i)
                        .unwrap_or(self.src.len());
                    Tok::Ident(self.src[start..end].to_string())
                }
                other => return Err(self.err(format!("unexpected character {other:?}"))),
            };
            out.push(Token { tok, line, col });
        }
        Ok(out)
    }
}

struct Parser {
    toks: Vec<Token>,
    pos: usize,
}

enum RawType {
    Named(String),
    Builtin(FieldType),
}

struct RawField {
    name: String,
    ty: RawType,
    vector: bool,
    default: Option<ScalarDefault>,
}

struct RawTable {
    name: String,
    fields: Vec<RawField>,
}

impl Parser {
    fn peek(&self) -> &Tok {
        &self.toks[self.pos].tok
    }

    fn here(&self) -> (usize, usize) {
        (self.toks[self.pos].line, self.toks[self.pos].col)
    }

    fn bump(&mut self) -> Tok {
        let t = self.toks[self.pos].tok.clone();
        if self.pos + 1 < self.toks.len() {
            self.pos += 1;
        }
        t
    }

    fn err(&self, message: impl Into<String>) -> Error {
        let (line, col) = self.here();
        Error::ParseError {
            line,
            col,
            message: message.into(),
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.bump() {
            Tok::Ident(s) => Ok(s),
            other => Err(self.err(format!("expected identifier, got {other:?}"))),
        }
    }

    fn expect(&mut self, want: Tok) -> Result<()> {
        let got = self.bump();
        if got == want {
            Ok(())
        } else {
            Err(self.err(format!("expected {want:?}, got {got:?}")))
        }
    }

    fn builtin_type(name: &str) -> Option<FieldType> {
        Some(match name {
            "i8" => FieldType::Int(IntWidth::I8),
            "i16" => FieldType::Int(IntWidth::I16),
            "i32" => FieldType::Int(IntWidth::I32),
            "i64" => FieldType::Int(IntWidth::I64),
            "u8" => FieldType::Int(IntWidth::U8),
            "u16" => FieldType::Int(IntWidth::U16),
            "u32" => FieldType::Int(IntWidth::U32),
            "u64" => FieldType::Int(IntWidth::U64),
            "f32" => FieldType::F32,
            "f64" => FieldType::F64,
            "string" => FieldType::Str,
            _ => return None,
        })
    }

    fn parse_type(&mut self) -> Result<RawType> {
        let name = self.expect_ident()?;
        Ok(match Self::builtin_type(&name) {
            Some(ft) => RawType::Builtin(ft),
            None => RawType::Named(name),
        })
    }

    fn parse_field(&mut self) -> Result<RawField> {
        let name = self.expect_ident()?;
        self.expect(Tok::Colon)?;
        let (ty, vector) = if *self.peek() == Tok::LBracket {
            self.bump();
            let ty = self.parse_type()?;
            self.expect(Tok::RBracket)?;
            (ty, true)
        } else {
            (self.parse_type()?, false)
        };
        let default = if *self.peek() == Tok::Eq {
            self.bump();
            let (line, col) = self.here();
            let lit = self.bump();
            // Build the default in the variant matching the field's own
            // declared type (not the literal's lexical form): `x: f32 = 1;`
            // is a whole-number float default, not an int default wearing
            // an f32's clothes, and `x: i32 = 1.5;` is never sensible.
            let default = match (&ty, lit) {
                (RawType::Builtin(FieldType::F32), Tok::Int(v)) => ScalarDefault::F32(v as f32),
                (RawType::Builtin(FieldType::F32), Tok::Float(v)) => ScalarDefault::F32(v as f32),
                (RawType::Builtin(FieldType::F64), Tok::Int(v)) => ScalarDefault::F64(v as f64),
                (RawType::Builtin(FieldType::F64), Tok::Float(v)) => ScalarDefault::F64(v),
                (_, Tok::Int(v)) => ScalarDefault::Int(v),
                (_, Tok::Float(v)) => {
                    return Err(Error::ParseError {
                        line,
                        col,
                        message: format!("default {v} is a float literal but the field's type is not f32/f64"),
                    })
                }
                (_, other) => {
                    return Err(Error::ParseError {
                        line,
                        col,
                        message: format!("expected a default literal, got {other:?}"),
                    })
                }
            };
            Some(default)
        } else {
            None
        };
        self.expect(Tok::Semi)?;
        Ok(RawField {
            name,
            ty,
            vector,
            default,
        })
    }

    fn parse_enum(&mut self) -> Result<EnumDef> {
        let name = self.expect_ident()?;
        self.expect(Tok::Colon)?;
        let base_name = self.expect_ident()?;
        let base = match base_name.as_str() {
            "i8" => IntWidth::I8,
            "i16" => IntWidth::I16,
            "i32" => IntWidth::I32,
            "i64" => IntWidth::I64,
            "u8" => IntWidth::U8,
            "u16" => IntWidth::U16,
            "u32" => IntWidth::U32,
            "u64" => IntWidth::U64,
            other => return Err(self.err(format!("{other:?} is not a valid enum base type"))),
        };
        self.expect(Tok::LBrace)?;
        let mut members = Vec::new();
        loop {
            if *self.peek() == Tok::RBrace {
                self.bump();
                break;
            }
            let member_name = self.expect_ident()?;
            self.expect(Tok::Eq)?;
            let value = match self.bump() {
                Tok::Int(v) => v,
                other => return Err(self.err(format!("expected an integer, got {other:?}"))),
            };
            members.push((member_name, value));
            match self.peek() {
                Tok::Comma => {
                    self.bump();
                }
                Tok::RBrace => {}
                other => return Err(self.err(format!("expected ',' or '}}', got {other:?}"))),
            }
        }
        Ok(EnumDef {
            name,
            base,
            members,
        })
    }

    fn parse_table(&mut self) -> Result<RawTable> {
        let name = self.expect_ident()?;
        self.expect(Tok::LBrace)?;
        let mut fields = Vec::new();
        while *self.peek() != Tok::RBrace {
            fields.push(self.parse_field()?);
        }
        self.bump();
        Ok(RawTable { name, fields })
    }
}

/// Parse schema text into a validated [`Schema`].
pub fn parse(src: &str) -> Result<Schema> {
    let toks = Lexer::new(src).tokenize()?;
    let mut p = Parser { toks, pos: 0 };

    let mut namespace = None;
    let mut enums = Vec::new();
    let mut raw_tables = Vec::new();
    let mut root_name: Option<String> = None;

    loop {
        match p.peek().clone() {
            Tok::Eof => break,
            Tok::Ident(kw) if kw == "namespace" => {
                p.bump();
                namespace = Some(p.expect_ident()?);
                p.expect(Tok::Semi)?;
            }
            Tok::Ident(kw) if kw == "enum" => {
                p.bump();
                enums.push(p.parse_enum()?);
            }
            Tok::Ident(kw) if kw == "table" => {
                p.bump();
                raw_tables.push(p.parse_table()?);
            }
            Tok::Ident(kw) if kw == "root" => {
                p.bump();
                let name = p.expect_ident()?;
                p.expect(Tok::Semi)?;
                if root_name.is_some() {
                    return Err(p.err("duplicate root declaration"));
                }
                root_name = Some(name);
            }
            other => return Err(p.err(format!("expected a top-level declaration, got {other:?}"))),
        }
    }

    let root_name = root_name.ok_or_else(|| p.err("schema has no `root` declaration"))?;

    let enum_index = |name: &str| enums.iter().position(|e: &EnumDef| e.name == name);
    let table_index = |name: &str| raw_tables.iter().position(|t: &RawTable| t.name == name);

    let mut tables = Vec::with_capacity(raw_tables.len());
    for raw in &raw_tables {
        let mut fields = Vec::with_capacity(raw.fields.len());
        for f in &raw.fields {
            let ty = match &f.ty {
                RawType::Builtin(ft) => ft.clone(),
                RawType::Named(name) => {
                    if let Some(idx) = enum_index(name) {
                        FieldType::Enum(idx)
                    } else if let Some(idx) = table_index(name) {
                        FieldType::Table(idx)
                    } else {
                        return Err(Error::SchemaInvalid {
                            reason: format!(
                                "field {:?} of table {:?} references unknown type {:?}",
                                f.name, raw.name, name
                            ),
                        });
                    }
                }
            };
            fields.push(FieldDef {
                name: f.name.clone(),
                ty,
                vector: f.vector,
                default: f.default,
            });
        }
        tables.push(TableDef {
            name: raw.name.clone(),
            fields,
        });
    }

    Schema::new(namespace, enums, tables, &root_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;

    #[test]
    fn parses_scalars_and_root() {
        let schema = parse(
            r#"
            table T {
                a: i32;
                b: u64;
                c: i8;
            }
            root T;
            "#,
        )
        .unwrap();
        assert_eq!(schema.root().name, "T");
        assert_eq!(schema.root().fields.len(), 3);
    }

    #[test]
    fn parses_enum_and_vector_and_forward_table_ref() {
        let schema = parse(
            r#"
            namespace demo;

            enum Color : u8 {
                Red = 0,
                Green = 1,
                Blue = 2,
            }

            table Out {
                color: Color;
                xs: [u16];
                child: Inner;
            }

            table Inner {
                v: i32;
            }

            root Out;
            "#,
        )
        .unwrap();
        assert_eq!(schema.namespace(), Some("demo"));
        let out = schema.root();
        assert!(matches!(out.fields[0].ty, FieldType::Enum(_)));
        assert!(out.fields[1].vector);
        assert!(matches!(out.fields[2].ty, FieldType::Table(_)));
    }

    #[test]
    fn missing_root_is_a_parse_error() {
        let err = parse("table T { a: i32; }").unwrap_err();
        assert!(matches!(err, Error::ParseError { .. }));
    }

    #[test]
    fn unresolved_type_reference_is_schema_invalid() {
        let err = parse("table T { a: Nope; } root T;").unwrap_err();
        assert!(matches!(err, Error::SchemaInvalid { .. }));
    }

    #[test]
    fn scalar_default_is_parsed() {
        let schema = parse("table T { a: i32 = 7; } root T;").unwrap();
        assert_eq!(
            schema.root().fields[0].default,
            Some(ScalarDefault::Int(7))
        );
    }

    #[test]
    fn f32_default_parses_as_f32_not_f64() {
        let schema = parse("table T { a: f32 = 1.5; } root T;").unwrap();
        assert_eq!(
            schema.root().fields[0].default,
            Some(ScalarDefault::F32(1.5))
        );
    }

    #[test]
    fn f32_default_accepts_a_whole_number_int_literal() {
        let schema = parse("table T { a: f32 = 2; } root T;").unwrap();
        assert_eq!(
            schema.root().fields[0].default,
            Some(ScalarDefault::F32(2.0))
        );
    }

    #[test]
    fn f64_default_parses_as_f64() {
        let schema = parse("table T { a: f64 = 1.5; } root T;").unwrap();
        assert_eq!(
            schema.root().fields[0].default,
            Some(ScalarDefault::F64(1.5))
        );
    }

    #[test]
    fn float_literal_default_on_an_int_field_is_a_parse_error() {
        let err = parse("table T { a: i32 = 1.5; } root T;").unwrap_err();
        assert!(matches!(err, Error::ParseError { .. }));
    }
}
