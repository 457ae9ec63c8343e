use std::iter::Peekable;
use std::str::Chars;

use anyhow::{anyhow, bail, Result};

use crate::descriptor::{parse_template, TemplateParam};
use crate::node::{Node, PortDefinition};
use crate::nodes::take_str;
use crate::ports::PortSet;
use crate::types::{PortData, PortType};

/// printf-style formatter. The format string arrives on `input`; one extra
/// input per template parameter supplies the arguments, in template order.
pub struct FormatNode {
    params: Vec<TemplateParam>,
}

impl FormatNode {
    pub fn from_template(template: &str) -> Result<Self> {
        let params = parse_template(template)?;

        for (idx, param) in params.iter().enumerate() {
            if param.name == "input" {
                bail!("format: parameter name 'input' is reserved for the format string");
            }
            if params[..idx].iter().any(|p| p.name == param.name) {
                bail!("format: duplicate parameter '{}'", param.name);
            }
        }

        Ok(Self { params })
    }
}

impl Node for FormatNode {
    fn node_type(&self) -> &str {
        "format"
    }

    fn input_ports(&self) -> Vec<PortDefinition> {
        let mut ports = vec![PortDefinition::new("input", PortType::String)];
        ports.extend(
            self.params
                .iter()
                .map(|param| PortDefinition::new(param.name.clone(), param.port_type)),
        );
        ports
    }

    fn output_ports(&self) -> Vec<PortDefinition> {
        vec![
            PortDefinition::new("output", PortType::String),
            PortDefinition::new("error", PortType::String),
        ]
    }

    fn run(&mut self, ports: &mut PortSet) -> Result<bool> {
        if !ports.all_pending() {
            return Ok(false);
        }

        let format = take_str(ports, "input")?;
        let args = self
            .params
            .iter()
            .map(|param| ports.take_input(&param.name))
            .collect::<Result<Vec<_>>>()?;

        match render_format(&format, &args) {
            Ok(text) => ports.send_output("output", PortData::Str(text))?,
            Err(err) => ports.send_output("error", PortData::Str(err.to_string()))?,
        }
        Ok(true)
    }
}

/// Upper bound for both width and precision of one directive.
const MAX_FIELD_SIZE: usize = 4096;

#[derive(Debug, Default)]
struct Directive {
    left_align: bool,
    zero_pad: bool,
    plus_sign: bool,
    space_sign: bool,
    width: usize,
    precision: Option<usize>,
    conversion: char,
}

/// Substitute `args` into `format`. Every argument must be consumed.
pub fn render_format(format: &str, args: &[PortData]) -> Result<String> {
    let mut out = String::with_capacity(format.len());
    let mut remaining = args.iter();
    let mut chars = format.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }

        let directive = parse_directive(&mut chars)?;
        if directive.conversion == '%' {
            out.push('%');
            continue;
        }

        let arg = remaining
            .next()
            .ok_or_else(|| anyhow!("too few arguments"))?;
        let (sign, body) = convert(&directive, arg)?;
        pad_into(&mut out, &directive, sign, &body);
    }

    if remaining.next().is_some() {
        bail!("too many arguments for format string");
    }

    Ok(out)
}

fn parse_directive(chars: &mut Peekable<Chars<'_>>) -> Result<Directive> {
    let mut directive = Directive::default();

    while let Some(&flag) = chars.peek() {
        match flag {
            '-' => directive.left_align = true,
            '0' => directive.zero_pad = true,
            '+' => directive.plus_sign = true,
            ' ' => directive.space_sign = true,
            _ => break,
        }
        chars.next();
    }

    directive.width = read_number(chars);
    if directive.width > MAX_FIELD_SIZE {
        bail!("width too big");
    }
    if chars.peek() == Some(&'.') {
        chars.next();
        let precision = read_number(chars);
        if precision > MAX_FIELD_SIZE {
            bail!("precision too big");
        }
        directive.precision = Some(precision);
    }

    directive.conversion = match chars.next() {
        Some(c @ ('d' | 'i' | 'f' | 's' | 'x' | 'o' | 'b' | '%')) => c,
        Some(other) => bail!("malformed format string - %{other}"),
        None => bail!("incomplete format specifier; use %% (double %) instead"),
    };

    Ok(directive)
}

fn read_number(chars: &mut Peekable<Chars<'_>>) -> usize {
    let mut value = 0usize;
    while let Some(digit) = chars.peek().and_then(|c| c.to_digit(10)) {
        value = value.saturating_mul(10).saturating_add(digit as usize);
        chars.next();
    }
    value
}

/// Returns the sign prefix and the unpadded body.
fn convert(directive: &Directive, arg: &PortData) -> Result<(&'static str, String)> {
    match directive.conversion {
        'd' | 'i' | 'x' | 'o' | 'b' => {
            let value = integer_arg(arg)?;
            let magnitude = value.unsigned_abs();
            let mut digits = match directive.conversion {
                'x' => format!("{magnitude:x}"),
                'o' => format!("{magnitude:o}"),
                'b' => format!("{magnitude:b}"),
                _ => magnitude.to_string(),
            };
            if let Some(precision) = directive.precision {
                if digits.len() < precision {
                    digits.insert_str(0, &"0".repeat(precision - digits.len()));
                }
            }
            Ok((sign_for(directive, value < 0), digits))
        }
        'f' => {
            let value = float_arg(arg)?;
            let precision = directive.precision.unwrap_or(6);
            let body = format!("{:.*}", precision, value.abs());
            Ok((sign_for(directive, value.is_sign_negative() && value != 0.0), body))
        }
        's' => {
            let mut text = arg.to_string();
            if let Some(precision) = directive.precision {
                text = text.chars().take(precision).collect();
            }
            Ok(("", text))
        }
        other => bail!("malformed format string - %{other}"),
    }
}

fn sign_for(directive: &Directive, negative: bool) -> &'static str {
    if negative {
        "-"
    } else if directive.plus_sign {
        "+"
    } else if directive.space_sign {
        " "
    } else {
        ""
    }
}

fn integer_arg(arg: &PortData) -> Result<i64> {
    match arg {
        PortData::Int(value) => Ok(*value),
        PortData::Float(value) if value.is_finite() => Ok(value.trunc() as i64),
        PortData::Float(value) => bail!("{value} cannot be converted to Integer"),
        PortData::Str(text) => text
            .trim()
            .parse()
            .map_err(|_| anyhow!("invalid value for Integer(): \"{text}\"")),
        other => bail!("can't convert {} into Integer", other.port_type()),
    }
}

fn float_arg(arg: &PortData) -> Result<f64> {
    match arg {
        PortData::Float(value) => Ok(*value),
        PortData::Int(value) => Ok(*value as f64),
        PortData::Str(text) => text
            .trim()
            .parse()
            .map_err(|_| anyhow!("invalid value for Float(): \"{text}\"")),
        other => bail!("can't convert {} into Float", other.port_type()),
    }
}

fn pad_into(out: &mut String, directive: &Directive, sign: &str, body: &str) {
    let len = sign.chars().count() + body.chars().count();
    let fill = directive.width.saturating_sub(len);

    if directive.left_align {
        out.push_str(sign);
        out.push_str(body);
        out.extend(std::iter::repeat(' ').take(fill));
    } else if directive.zero_pad && directive.conversion != 's' {
        out.push_str(sign);
        out.extend(std::iter::repeat('0').take(fill));
        out.push_str(body);
    } else {
        out.extend(std::iter::repeat(' ').take(fill));
        out.push_str(sign);
        out.push_str(body);
    }
}
