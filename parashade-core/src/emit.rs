//! AST to IR lowering.
//!
//! A single pass walks the statement list, assigns local slots on each
//! `let`, constant-folds superlative and comparison calls, and appends
//! symbolic instructions. `if` branches are emitted with placeholder
//! targets and patched once the arm lengths are known.

use crate::ast::{DeclType, Expr, Function, Stmt};
use crate::builtins::{self, Arity, BuiltinKind};
use crate::error::CoreError;
use crate::ir::Instr;
use crate::locals::{Local, LocalTable, LocalType, Warning};

/// Result of lowering `main`: the symbolic sequence, the locals in slot
/// order, and the warnings (implicit-type notes first, then folds and
/// hints, each in recorded order).
#[derive(Debug)]
pub struct Lowered {
    pub code: Vec<Instr>,
    pub locals: Vec<Local>,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Default)]
pub struct Emitter {
    code: Vec<Instr>,
    locals: LocalTable,
    folds: Vec<Warning>,
}

impl Emitter {
    pub fn lower(func: &Function) -> Result<Lowered, CoreError> {
        let mut emitter = Emitter::default();
        for stmt in &func.body {
            emitter.stmt(stmt)?;
        }
        let (locals, mut warnings) = emitter.locals.into_parts();
        warnings.extend(emitter.folds);
        Ok(Lowered {
            code: emitter.code,
            locals,
            warnings,
        })
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<(), CoreError> {
        match stmt {
            Stmt::Let {
                name,
                decl,
                expr,
                line,
            } => {
                let ty = match decl {
                    DeclType::Int => LocalType::Int,
                    DeclType::Arr => LocalType::Arr,
                    DeclType::Implicit => infer_type(expr),
                };
                let slot = self
                    .locals
                    .declare(name, ty, *line, *decl != DeclType::Implicit);
                self.expr(expr)?;
                self.code.push(Instr::StoreLocal(slot));
            }
            Stmt::Return { expr, .. } => {
                self.expr(expr)?;
                self.code.push(Instr::Ret);
            }
            Stmt::If {
                cond,
                then_body,
                else_body,
                ..
            } => {
                self.expr(cond)?;
                let jz = self.code.len();
                self.code.push(Instr::JzAbs(0));
                for stmt in then_body {
                    self.stmt(stmt)?;
                }
                let jend = self.code.len();
                self.code.push(Instr::JmpAbs(0));
                self.code[jz] = Instr::JzAbs(self.code.len());
                for stmt in else_body {
                    self.stmt(stmt)?;
                }
                self.code[jend] = Instr::JmpAbs(self.code.len());
            }
        }
        Ok(())
    }

    fn expr(&mut self, expr: &Expr) -> Result<(), CoreError> {
        match expr {
            Expr::Num { value, .. } => self.code.push(Instr::PushImm64(*value)),
            Expr::Var { name, line } => {
                let slot =
                    self.locals
                        .slot_of(name)
                        .ok_or_else(|| CoreError::UndeclaredName {
                            name: name.clone(),
                            line: *line,
                        })?;
                self.code.push(Instr::LoadLocal(slot));
            }
            Expr::Add { lhs, rhs, .. } => {
                self.expr(lhs)?;
                self.expr(rhs)?;
                self.code.push(Instr::Add);
            }
            Expr::Call { name, args, line } => self.call(name, args, *line)?,
        }
        Ok(())
    }

    fn call(&mut self, name: &str, args: &[Expr], line: u32) -> Result<(), CoreError> {
        let builtin = builtins::lookup(name).ok_or_else(|| CoreError::UnknownCall {
            name: name.to_string(),
            line,
        })?;
        if let Arity::Exact(expected) = builtin.arity {
            if args.len() != expected {
                return Err(CoreError::CallArity {
                    name: name.to_string(),
                    expected,
                    given: args.len(),
                    line,
                });
            }
        }

        match builtin.kind {
            BuiltinKind::Max => self.fold_or_binary(name, args, line, Instr::Max, i64::max)?,
            BuiltinKind::Min => self.fold_or_binary(name, args, line, Instr::Min, i64::min)?,
            BuiltinKind::Cmp(op) => {
                self.fold_or_binary(name, args, line, op.instr(), move |lhs, rhs| {
                    op.eval(lhs, rhs)
                })?
            }
            BuiltinKind::EverExact => {
                if let Some(value) = fold_expr(&args[0]) {
                    self.fold_warning("fold:ever_exact", line);
                    self.code.push(Instr::PushImm64(value as u64));
                } else {
                    self.expr(&args[0])?;
                }
            }
            BuiltinKind::UtterlyInline => {
                // identity with an annotation, folded or not
                self.fold_warning("hint:inline", line);
                self.expr(&args[0])?;
            }
            BuiltinKind::ArrNew => {
                self.expr(&args[0])?;
                self.code.push(Instr::ArrNew);
            }
            BuiltinKind::ArrGet => {
                self.expr(&args[0])?;
                self.expr(&args[1])?;
                self.code.push(Instr::ArrGet);
            }
            BuiltinKind::ArrSet => {
                for arg in args {
                    self.expr(arg)?;
                }
                self.code.push(Instr::ArrSet);
            }
            BuiltinKind::ArrOf => {
                self.code.push(Instr::PushImm64(args.len() as u64));
                self.code.push(Instr::ArrNew);
                // ARR_SET pushes the handle back, so each element leaves
                // exactly the handle for the next store
                for (index, arg) in args.iter().enumerate() {
                    self.code.push(Instr::PushImm64(index as u64));
                    self.expr(arg)?;
                    self.code.push(Instr::ArrSet);
                }
            }
        }
        Ok(())
    }

    fn fold_or_binary(
        &mut self,
        name: &str,
        args: &[Expr],
        line: u32,
        op: Instr,
        eval: impl FnOnce(i64, i64) -> i64,
    ) -> Result<(), CoreError> {
        if let (Some(lhs), Some(rhs)) = (fold_expr(&args[0]), fold_expr(&args[1])) {
            self.folds.push(Warning {
                code: "W100",
                message: format!("fold:{name}"),
                line,
            });
            self.code.push(Instr::PushImm64(eval(lhs, rhs) as u64));
            return Ok(());
        }
        self.expr(&args[0])?;
        self.expr(&args[1])?;
        self.code.push(op);
        Ok(())
    }

    fn fold_warning(&mut self, message: &str, line: u32) {
        self.folds.push(Warning {
            code: "W100",
            message: message.to_string(),
            line,
        });
    }
}

/// Closed-form constant evaluator. Works over signed 64-bit values so that
/// folded results agree with what the VM computes at runtime (wrapping add,
/// signed comparisons and min/max).
fn fold_expr(expr: &Expr) -> Option<i64> {
    match expr {
        Expr::Num { value, .. } => Some(*value as i64),
        Expr::Var { .. } => None,
        Expr::Add { lhs, rhs, .. } => Some(fold_expr(lhs)?.wrapping_add(fold_expr(rhs)?)),
        Expr::Call { name, args, .. } => {
            let builtin = builtins::lookup(name)?;
            match builtin.kind {
                BuiltinKind::Max if args.len() == 2 => {
                    Some(fold_expr(&args[0])?.max(fold_expr(&args[1])?))
                }
                BuiltinKind::Min if args.len() == 2 => {
                    Some(fold_expr(&args[0])?.min(fold_expr(&args[1])?))
                }
                BuiltinKind::Cmp(op) if args.len() == 2 => {
                    Some(op.eval(fold_expr(&args[0])?, fold_expr(&args[1])?))
                }
                BuiltinKind::EverExact | BuiltinKind::UtterlyInline if args.len() == 1 => {
                    fold_expr(&args[0])
                }
                _ => None,
            }
        }
    }
}

fn infer_type(expr: &Expr) -> LocalType {
    match expr {
        Expr::Call { name, .. } if builtins::returns_array(name) => LocalType::Arr,
        _ => LocalType::Int,
    }
}
