//! The bytecode interpreter.

use crate::body::BlockBody;
use crate::filters;
use crate::instr::Instr;
use crate::render::context::Context;
use crate::render::recover::{skip_unit, RescuePoint};
use crate::render::stack::Stack;
use crate::render::NodeRenderer;
use crate::types::program::Program;
use crate::value::Map;
use crate::{Error, Result, Value};

/// The virtual machine state attached to a [`Context`], created on first
/// use and shared by nested renders.
#[derive(Debug, Default)]
pub struct Vm {
    stack: Stack,
    filtering: bool,
}

impl Vm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filtering(&self) -> bool {
        self.filtering
    }
}

/// Where the output of an instruction stream goes.
enum Output<'o> {
    Render {
        program: &'o Program,
        out: &'o mut String,
    },
    /// Expression code, writes are not allowed.
    Evaluate,
}

/// Renders a block body of the program, appending to `out`.
pub fn render(cx: &mut Context<'_>, program: &Program, body: BlockBody, out: &mut String) -> Result<()> {
    let block = program.document.block(body)?;
    cx.resource_limits_mut()
        .increment_render_score(u64::from(block.render_score()))?;
    cx.vm().stack.reserve(block.max_stack());
    frame(
        cx,
        block.code(),
        block.constants(),
        Output::Render { program, out },
    )
}

/// Evaluates expression code and returns the value it leaves on the stack.
pub fn evaluate(cx: &mut Context<'_>, code: &[u8], constants: &[Value], max_stack: usize) -> Result<Value> {
    cx.vm().stack.reserve(max_stack);
    let base = cx.vm().stack.len();
    frame(cx, code, constants, Output::Evaluate)?;
    let vm = cx.vm();
    let value = match vm.stack.len() > base {
        true => vm.stack.pop(),
        false => Err(Error::internal("expression left no value on the stack")),
    };
    vm.stack.truncate(base);
    value
}

/// Runs an instruction stream, the stack is always restored to the length
/// it had on entry.
fn frame(cx: &mut Context<'_>, code: &[u8], constants: &[Value], mut output: Output<'_>) -> Result<()> {
    let base = cx.vm().stack.len();
    let result = run(cx, code, constants, &mut output, base);
    let vm = cx.vm();
    if result.is_err() || matches!(output, Output::Render { .. }) {
        vm.stack.truncate(base);
    } else {
        vm.stack.truncate(vm.stack.len().min(base + 1));
    }
    result
}

fn run(
    cx: &mut Context<'_>,
    code: &[u8],
    constants: &[Value],
    output: &mut Output<'_>,
    base: usize,
) -> Result<()> {
    let mut ip = 0;
    let mut rescue: Option<RescuePoint> = None;

    loop {
        let (instr, next) = Instr::decode(code, ip)?;
        match instr {
            Instr::Leave => return Ok(()),
            Instr::RenderVariableRescue { line } => {
                rescue = Some(RescuePoint {
                    ip: next,
                    stack_len: cx.vm().stack.len(),
                    line,
                });
                ip = next;
                continue;
            }
            _ => {}
        }

        match step(cx, instr, constants, output) {
            Ok(Step::Next) => {
                if let Instr::PopWrite = instr {
                    rescue = None;
                }
                ip = next;
            }
            Ok(Step::Interrupted) => return Ok(()),
            Err(err) => {
                let point = match rescue.take() {
                    Some(point) if err.is_recoverable() => point,
                    _ => return Err(err),
                };
                cx.vm().stack.truncate(point.stack_len.max(base));
                ip = skip_unit(code, point.ip)?;
                let msg = cx.handle_error(err.with_line(point.line_number()))?;
                write(cx, output, &msg)?;
            }
        }
    }
}

enum Step {
    Next,
    /// A `break` or `continue` is pending, leave the body.
    Interrupted,
}

fn step(cx: &mut Context<'_>, instr: Instr<'_>, constants: &[Value], output: &mut Output<'_>) -> Result<Step> {
    match instr {
        Instr::Leave | Instr::RenderVariableRescue { .. } => {}

        Instr::WriteRaw(bytes) => {
            let text = std::str::from_utf8(bytes)
                .map_err(|_| Error::internal("raw text is not valid utf-8"))?;
            write(cx, output, text)?;
        }

        Instr::WriteNode(index) => {
            let (program, out) = match output {
                Output::Render { program, out } => (*program, &mut **out),
                Output::Evaluate => return Err(err_write_in_expression()),
            };
            let entry = program
                .node(index)
                .ok_or_else(|| Error::internal(format!("node {index} out of range")))?;
            let result = entry.node.render(&mut NodeRenderer::new(cx, program, out));
            if let Err(err) = result {
                let msg = cx.handle_error(err.with_line(entry.line))?;
                out.push_str(&msg);
                cx.resource_limits_mut().increment_write_score(out.len())?;
            }
            if cx.has_interrupts() {
                return Ok(Step::Interrupted);
            }
        }

        Instr::PopWrite => {
            let value = cx.vm().stack.pop()?;
            match output {
                Output::Render { out, .. } => {
                    value.render_to(out);
                    let len = out.len();
                    cx.resource_limits_mut().increment_write_score(len)?;
                }
                Output::Evaluate => return Err(err_write_in_expression()),
            }
        }

        Instr::PushConst(i) => {
            let value = constant(constants, i)?.clone();
            cx.vm().stack.push(value);
        }
        Instr::PushNil => cx.vm().stack.push(Value::Nil),
        Instr::PushTrue => cx.vm().stack.push(Value::Bool(true)),
        Instr::PushFalse => cx.vm().stack.push(Value::Bool(false)),
        Instr::PushInt8(n) => cx.vm().stack.push(Value::Integer(n.into())),
        Instr::PushInt16(n) => cx.vm().stack.push(Value::Integer(n.into())),

        Instr::FindStaticVar(i) => {
            let key = constant(constants, i)?.to_key();
            let value = cx.find_variable(&key, true)?;
            cx.vm().stack.push(value);
        }
        Instr::FindVar => {
            let key = cx.vm().stack.pop()?.to_key();
            let value = cx.find_variable(&key, true)?;
            cx.vm().stack.push(value);
        }

        Instr::LookupConstKey(i) | Instr::LookupCommand(i) => {
            let key = constant(constants, i)?;
            let object = cx.vm().stack.pop()?;
            let is_command = matches!(instr, Instr::LookupCommand(_));
            let value = cx.lookup_key(&object, key, is_command)?;
            cx.vm().stack.push(value);
        }
        Instr::LookupKey => {
            let key = cx.vm().stack.pop()?;
            let object = cx.vm().stack.pop()?;
            let value = cx.lookup_key(&object, &key, false)?;
            cx.vm().stack.push(value);
        }

        Instr::NewIntRange => {
            let end = cx.vm().stack.pop()?;
            let start = cx.vm().stack.pop()?;
            let range = Value::Range(start.to_integer()?, end.to_integer()?);
            cx.vm().stack.push(range);
        }
        Instr::HashNew(pairs) => {
            let values = cx.vm().stack.pop_n(2 * usize::from(pairs))?;
            let mut map = Map::new();
            let mut values = values.into_iter();
            while let (Some(key), Some(value)) = (values.next(), values.next()) {
                map.insert(key.to_key(), value);
            }
            cx.vm().stack.push(Value::Map(map));
        }

        Instr::Filter { name, argc } => {
            let name = constant(constants, name)?.to_key();
            call_filter(cx, &name, argc)?;
        }
        Instr::BuiltinFilter { id, argc } => {
            let name = filters::builtin_name(id)
                .ok_or_else(|| Error::internal(format!("unknown builtin filter {id}")))?;
            call_filter(cx, name, argc)?;
        }
    }
    Ok(Step::Next)
}

fn call_filter(cx: &mut Context<'_>, name: &str, argc: u8) -> Result<()> {
    let args = cx.vm().stack.pop_n(usize::from(argc))?;
    cx.vm().filtering = true;
    let result = cx.call_filter(name, args);
    cx.vm().filtering = false;
    let value = result.map_err(Error::into_filter_argument)?;
    cx.vm().stack.push(value);
    Ok(())
}

fn write(cx: &mut Context<'_>, output: &mut Output<'_>, text: &str) -> Result<()> {
    match output {
        Output::Render { out, .. } => {
            out.push_str(text);
            let len = out.len();
            cx.resource_limits_mut().increment_write_score(len)
        }
        Output::Evaluate => Err(err_write_in_expression()),
    }
}

fn constant(constants: &[Value], i: u16) -> Result<&Value> {
    constants
        .get(usize::from(i))
        .ok_or_else(|| Error::internal(format!("constant {i} out of range")))
}

fn err_write_in_expression() -> Error {
    Error::internal("expression code cannot write output")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::assemble::Assembler;
    use crate::{value, Engine, ErrorKind};

    fn eval(asm: &Assembler, env: Value) -> Result<Value> {
        let engine = Engine::new();
        let mut cx = Context::new(&engine);
        cx.push_environment(env)?;
        evaluate(&mut cx, asm.code(), asm.constants(), asm.max_stack_size())
    }

    #[test]
    fn evaluate_lookup_chain() {
        let mut asm = Assembler::new();
        asm.add_find_static_variable("user").unwrap();
        asm.add_lookup_const_key("tags").unwrap();
        asm.add_lookup_command("first").unwrap();
        asm.add_leave();
        let env = value! { user: { tags: ["a", "b"] } };
        assert_eq!(eval(&asm, env).unwrap(), Value::from("a"));
    }

    #[test]
    fn evaluate_dynamic_range() {
        let mut asm = Assembler::new();
        asm.add_push_literal(Value::Integer(1)).unwrap();
        asm.add_find_static_variable("n").unwrap();
        asm.add_new_int_range();
        asm.add_leave();
        assert_eq!(eval(&asm, value! { n: "3" }).unwrap(), Value::Range(1, 3));
    }

    #[test]
    #[cfg(feature = "builtins")]
    fn evaluate_filter_with_kwargs() {
        let mut asm = Assembler::new();
        asm.add_push_literal(Value::Bool(false)).unwrap();
        asm.add_push_literal(Value::from("fallback")).unwrap();
        asm.add_push_literal(Value::from("allow_false")).unwrap();
        asm.add_push_literal(Value::Bool(true)).unwrap();
        asm.add_hash_new(1).unwrap();
        asm.add_filter("default", 3).unwrap();
        asm.add_leave();
        assert_eq!(eval(&asm, value! {}).unwrap(), Value::Bool(false));
    }

    #[test]
    #[cfg(feature = "builtins")]
    fn evaluate_filter_type_error_is_argument_error() {
        let mut asm = Assembler::new();
        asm.add_push_literal(Value::from("a")).unwrap();
        asm.add_push_literal(Value::from(vec![1])).unwrap();
        asm.add_filter("append", 2).unwrap();
        asm.add_leave();
        let err = eval(&asm, value! {}).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FilterArgument);
    }

    #[test]
    fn evaluate_rejects_writes() {
        let mut asm = Assembler::new();
        asm.add_write_raw("x");
        asm.add_leave();
        let err = eval(&asm, value! {}).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn evaluate_invalid_opcode() {
        let engine = Engine::new();
        let mut cx = Context::new(&engine);
        let err = evaluate(&mut cx, &[0xee], &[], 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(cx.vm().stack.len(), 0);
    }
}
